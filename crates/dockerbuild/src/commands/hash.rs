use super::Workspace;
use colored::Colorize;
use dockerbuild_build::Image;
use dockerbuild_core::hash_build_context;
use std::collections::BTreeMap;

/// 指定したコンテキストのハッシュだけを表示
pub fn handle_context(context: &str, dockerfile: Option<&str>) -> anyhow::Result<()> {
    let default_dockerfile = dockerbuild_core::path::join(context, "Dockerfile");
    let dockerfile = dockerfile.unwrap_or(&default_dockerfile);
    let hash = hash_build_context(context, Some(dockerfile), &BTreeMap::new())?;
    println!("{hash}");
    Ok(())
}

/// マニフェストの全イメージのハッシュを表示
pub fn handle(workspace: &Workspace) -> anyhow::Result<()> {
    for (name, args) in &workspace.manifest.images {
        // デフォルトのDockerfileを補うため先に検証する
        let args = Image::check(args.clone(), true).unwrap_or_else(|_| args.clone());
        let hash = hash_build_context(
            args.context_location(),
            args.dockerfile_location(),
            &args.named_contexts(),
        )?;
        println!("{} {}", name.cyan(), hash);
    }
    Ok(())
}
