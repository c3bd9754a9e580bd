use super::Workspace;
use crate::state::Entry;
use crate::utils;
use colored::Colorize;
use dockerbuild_build::{DockerClient, Image, Index};

/// レジストリに残っているものだけを状態に残す
pub async fn handle(workspace: &Workspace) -> anyhow::Result<()> {
    workspace.print_header("状態を更新中...");

    let mut state = workspace.store.load()?;
    if state.is_empty() {
        println!("状態にリソースがありません");
        return Ok(());
    }
    let host = super::connect()?;
    let mut failed = 0;

    for (name, entry) in std::mem::take(&mut state.images) {
        let client = DockerClient::for_image(host.clone(), &entry.state.args);
        let inputs = entry.state.args.clone();
        let result = Image::new(&client)
            .read(&entry.id, inputs, entry.state.clone())
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                // 読めなかったものは状態をそのまま残す
                println!("  ⚠ image {}: {}", name.cyan(), e.user_message());
                state.images.insert(name, entry);
                failed += 1;
                continue;
            }
        };

        if response.exists() {
            println!("  {} image {}", "✓".green(), name.cyan());
            state
                .images
                .insert(name, Entry::new(response.id, response.state));
        } else {
            utils::print_delete("image", &name);
        }
    }

    for (name, entry) in std::mem::take(&mut state.indexes) {
        let client = DockerClient::for_index(host.clone(), &entry.state.args);
        let inputs = entry.state.args.clone();
        let result = Index::new(&client)
            .read(&entry.id, inputs, entry.state.clone())
            .await;
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                // 読めなかったものは状態をそのまま残す
                println!("  ⚠ index {}: {}", name.cyan(), e.user_message());
                state.indexes.insert(name, entry);
                failed += 1;
                continue;
            }
        };

        if response.exists() {
            println!("  {} index {}", "✓".green(), name.cyan());
            state
                .indexes
                .insert(name, Entry::new(response.id, response.state));
        } else {
            utils::print_delete("index", &name);
        }
    }

    workspace.store.save(&state)?;
    if failed > 0 {
        anyhow::bail!("{} 件のリソースを読み込めませんでした", failed);
    }
    Ok(())
}
