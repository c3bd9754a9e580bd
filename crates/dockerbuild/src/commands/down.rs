use super::Workspace;
use crate::state::State;
use crate::utils;
use dockerbuild_build::{DockerClient, Host, Image, Index};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Image,
    Index,
}

pub async fn handle(workspace: &Workspace) -> anyhow::Result<()> {
    workspace.print_header("リソースを削除中...");

    let mut state = workspace.store.load()?;
    if state.is_empty() {
        println!("削除するリソースはありません");
        return Ok(());
    }

    let host = super::connect()?;
    let total = state.images.len() + state.indexes.len();
    let failed = delete_resources(&host, &mut state, |_, _| false).await;
    workspace.store.save(&state)?;

    utils::print_summary("削除", total - failed, failed);
    if failed > 0 {
        anyhow::bail!("{} 件のリソースを削除できませんでした", failed);
    }
    Ok(())
}

/// `keep` が false を返すリソースを削除し、失敗した件数を返す
///
/// インデックスはイメージを参照しているので先に削除する。
/// 削除できたリソースは状態から取り除く。
pub async fn delete_resources(
    host: &Arc<Host>,
    state: &mut State,
    keep: impl Fn(Kind, &str) -> bool,
) -> usize {
    let mut failed = 0;

    let indexes: Vec<String> = state
        .indexes
        .keys()
        .filter(|name| !keep(Kind::Index, name))
        .cloned()
        .collect();
    for name in indexes {
        let Some(entry) = state.indexes.get(&name).cloned() else {
            continue;
        };
        let client = DockerClient::for_index(host.clone(), &entry.state.args);
        utils::print_delete("index", &name);
        match Index::new(&client).delete(&entry.state).await {
            Ok(()) => {
                state.indexes.remove(&name);
            }
            Err(e) => {
                println!("    ⚠ {}", e.user_message());
                failed += 1;
            }
        }
    }

    let images: Vec<String> = state
        .images
        .keys()
        .filter(|name| !keep(Kind::Image, name))
        .cloned()
        .collect();
    for name in images {
        let Some(entry) = state.images.get(&name).cloned() else {
            continue;
        };
        let client = DockerClient::for_image(host.clone(), &entry.state.args);
        utils::print_delete("image", &name);
        match Image::new(&client).delete(&entry.state).await {
            Ok(()) => {
                state.images.remove(&name);
            }
            Err(e) => {
                println!("    ⚠ {}", e.user_message());
                failed += 1;
            }
        }
    }

    failed
}
