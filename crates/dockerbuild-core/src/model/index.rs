//! Indexリソース（マルチプラットフォームのマニフェストリスト）

use super::Registry;
use crate::defaults::WithDefaults;
use serde::{Deserialize, Serialize};

/// マニフェストリストの入力
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexArgs {
    /// 作成するマニフェストリストのタグ
    pub tag: String,
    /// まとめる既存イメージの参照
    pub sources: Vec<String>,
    /// レジストリへプッシュする（デフォルト: true）
    #[serde(default)]
    pub push: Option<bool>,
    #[serde(default)]
    pub registry: Option<Registry>,
}

impl IndexArgs {
    pub fn is_pushed(&self) -> bool {
        self.push.unwrap_or(true)
    }
}

impl WithDefaults for IndexArgs {
    fn with_defaults(mut self) -> Self {
        self.push.get_or_insert(true);
        self
    }
}

/// マニフェストリストの状態
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexState {
    #[serde(flatten)]
    pub args: IndexArgs,
    /// `tag@digest` 形式の参照
    #[serde(default, rename = "ref")]
    pub reference: String,
}
