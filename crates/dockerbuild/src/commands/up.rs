use super::Workspace;
use super::down::Kind;
use crate::state::Entry;
use crate::utils;
use colored::Colorize;
use dockerbuild_build::{BuildProgress, DockerClient, Image, Index};

pub async fn handle(workspace: &Workspace, preview: bool) -> anyhow::Result<()> {
    if preview {
        workspace.print_header("プレビュー中...");
    } else {
        workspace.print_header("ビルドを開始...");
    }

    let host = super::connect()?;
    let mut state = workspace.store.load()?;
    let mut succeeded = 0;
    let mut failed = 0;

    // インデックスはイメージを参照するので先にイメージをビルドする
    for (name, args) in &workspace.manifest.images {
        let args = match Image::check(args.clone(), preview) {
            Ok(args) => args,
            Err(failures) => {
                utils::print_failures("image", name, &failures);
                failed += 1;
                continue;
            }
        };

        if let Some(entry) = state.images.get(name) {
            let diff = Image::diff(&entry.state, &args)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            if !diff.has_changes() {
                utils::print_diff("image", name, &diff);
                succeeded += 1;
                continue;
            }
        }

        let client = DockerClient::for_image(host.clone(), &args);
        let image = Image::new(&client);
        let progress = BuildProgress::new("Building", name);

        match image.update(name, &args, preview).await {
            Ok((id, image_state)) => {
                let summary = if image_state.reference.is_empty() {
                    id.clone()
                } else {
                    image_state.reference.clone()
                };
                progress.finish_success(&format!("{} {}", name.cyan(), summary));
                if !preview {
                    state
                        .images
                        .insert(name.clone(), Entry::new(id, image_state));
                }
                succeeded += 1;
            }
            Err(e) => {
                progress.finish_error(&format!("{}: {}", name, e.user_message()));
                failed += 1;
            }
        }
    }

    for (name, args) in &workspace.manifest.indexes {
        let args = match Index::check(args.clone()) {
            Ok(args) => args,
            Err(failures) => {
                utils::print_failures("index", name, &failures);
                failed += 1;
                continue;
            }
        };

        let previous = state.indexes.get(name).cloned();
        let mut replaces = false;
        if let Some(entry) = &previous {
            let diff = Index::diff(&entry.state, &args);
            if !diff.has_changes() {
                utils::print_diff("index", name, &diff);
                succeeded += 1;
                continue;
            }
            replaces = diff.replaces();
        }

        let client = DockerClient::for_index(host.clone(), &args);
        let index = Index::new(&client);
        let progress = BuildProgress::new("Creating index", name);

        let result = match &previous {
            Some(entry) if !replaces => index
                .update(name, entry.state.clone(), &args, preview)
                .await
                .map(|s| (entry.id.clone(), s)),
            _ => index.create(name, &args, preview).await,
        };

        match result {
            Ok((id, index_state)) => {
                progress.finish_success(&format!("{} {}", name.cyan(), index_state.reference));
                if !preview {
                    // タグが変わった場合は新しく作ってから古いものを消す
                    if replaces
                        && let Some(old) = &previous
                        && let Err(e) = index.delete(&old.state).await
                    {
                        tracing::warn!(name = %name, "failed to delete replaced index: {}", e);
                    }
                    state
                        .indexes
                        .insert(name.clone(), Entry::new(id, index_state));
                }
                succeeded += 1;
            }
            Err(e) => {
                progress.finish_error(&format!("{}: {}", name, e.user_message()));
                failed += 1;
            }
        }
    }

    if !preview {
        // マニフェストから消えたリソースを削除する
        let manifest = &workspace.manifest;
        failed += super::down::delete_resources(&host, &mut state, |kind, name| match kind {
            Kind::Image => manifest.images.contains_key(name),
            Kind::Index => manifest.indexes.contains_key(name),
        })
        .await;
        workspace.store.save(&state)?;
    }

    utils::print_summary(if preview { "プレビュー" } else { "ビルド" }, succeeded, failed);
    if failed > 0 {
        anyhow::bail!("{} 件のリソースで失敗しました", failed);
    }
    if !preview {
        println!("状態: {}", workspace.store.path().display().to_string().dimmed());
    }
    Ok(())
}
