//! 適用済みリソースの状態ファイル
//!
//! マニフェストごとに `<state-dir>/<name>.json` を1つ持つ。

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use dockerbuild_core::{ImageState, IndexState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_STATE_DIR: &str = ".dockerbuild/state";

/// 1つのリソースの記録
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry<S> {
    pub id: String,
    pub state: S,
    pub updated_at: DateTime<Utc>,
}

impl<S> Entry<S> {
    pub fn new(id: String, state: S) -> Self {
        Self {
            id,
            state,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub images: BTreeMap<String, Entry<ImageState>>,
    #[serde(default)]
    pub indexes: BTreeMap<String, Entry<IndexState>>,
}

impl State {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.indexes.is_empty()
    }
}

/// 状態ファイルの読み書き
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(dir: &Path, manifest_name: &str) -> Self {
        Self {
            path: dir.join(format!("{manifest_name}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ファイルがなければ空の状態を返す
    pub fn load(&self) -> anyhow::Result<State> {
        if !self.path.exists() {
            return Ok(State::default());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("状態ファイルを読み込めません: {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("状態ファイルの形式が不正です: {}", self.path.display()))
    }

    /// 空の状態ならファイルを削除する
    pub fn save(&self, state: &State) -> anyhow::Result<()> {
        if state.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("状態ファイルを書き込めません: {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "state saved");
        Ok(())
    }
}
