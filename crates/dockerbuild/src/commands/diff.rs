use super::Workspace;
use crate::utils;
use dockerbuild_build::{Image, Index};

pub fn handle(workspace: &Workspace) -> anyhow::Result<()> {
    workspace.print_header("差分を計算中...");
    let state = workspace.store.load()?;

    for (name, args) in &workspace.manifest.images {
        let args = match Image::check(args.clone(), false) {
            Ok(args) => args,
            Err(failures) => {
                utils::print_failures("image", name, &failures);
                continue;
            }
        };
        match state.images.get(name) {
            Some(entry) => {
                let diff = Image::diff(&entry.state, &args)
                    .map_err(|e| anyhow::anyhow!(e.user_message()))?;
                utils::print_diff("image", name, &diff);
            }
            None => utils::print_create("image", name),
        }
    }

    for (name, args) in &workspace.manifest.indexes {
        let args = match Index::check(args.clone()) {
            Ok(args) => args,
            Err(failures) => {
                utils::print_failures("index", name, &failures);
                continue;
            }
        };
        match state.indexes.get(name) {
            Some(entry) => utils::print_diff("index", name, &Index::diff(&entry.state, &args)),
            None => utils::print_create("index", name),
        }
    }

    for name in state.images.keys() {
        if !workspace.manifest.images.contains_key(name) {
            utils::print_delete("image", name);
        }
    }
    for name in state.indexes.keys() {
        if !workspace.manifest.indexes.contains_key(name) {
            utils::print_delete("index", name);
        }
    }

    Ok(())
}
