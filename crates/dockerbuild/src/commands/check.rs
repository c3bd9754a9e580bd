use super::Workspace;
use crate::utils;
use colored::Colorize;
use dockerbuild_build::{Image, Index};

pub fn handle(workspace: &Workspace, preview: bool) -> anyhow::Result<()> {
    workspace.print_header("マニフェストを検証中...");

    let mut succeeded = 0;
    let mut failed = 0;

    for (name, args) in &workspace.manifest.images {
        match Image::check(args.clone(), preview) {
            Ok(_) => {
                println!("  {} image {}", "✓".green(), name.cyan());
                succeeded += 1;
            }
            Err(failures) => {
                utils::print_failures("image", name, &failures);
                failed += 1;
            }
        }
    }

    for (name, args) in &workspace.manifest.indexes {
        match Index::check(args.clone()) {
            Ok(_) => {
                println!("  {} index {}", "✓".green(), name.cyan());
                succeeded += 1;
            }
            Err(failures) => {
                utils::print_failures("index", name, &failures);
                failed += 1;
            }
        }
    }

    utils::print_summary("検証", succeeded, failed);
    if failed > 0 {
        anyhow::bail!("{} 件のリソースが不正です", failed);
    }
    Ok(())
}
