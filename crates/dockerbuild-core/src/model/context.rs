//! ビルドコンテキスト

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// ビルドコンテキストの場所
///
/// ローカルディレクトリ、リモートURL（git / http / tarball）、または `-`（標準入力）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub location: String,
}

impl Context {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn is_remote(&self) -> bool {
        is_remote_url(&self.location)
    }

    /// ローカルディレクトリを指しているか
    pub fn is_local_dir(&self) -> bool {
        !self.location.is_empty() && !self.is_remote() && Path::new(&self.location).is_dir()
    }
}

/// メインのコンテキストと名前付きコンテキスト
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    pub location: String,
    /// `FROM name` や `COPY --from=name` で参照できる追加コンテキスト
    #[serde(default)]
    pub named: BTreeMap<String, Context>,
}

impl BuildContext {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            named: BTreeMap::new(),
        }
    }

    pub fn context(&self) -> Context {
        Context::new(self.location.clone())
    }

    pub fn is_remote(&self) -> bool {
        is_remote_url(&self.location)
    }

    pub fn is_local_dir(&self) -> bool {
        self.context().is_local_dir()
    }

    /// 名前付きコンテキストをビルドオプション用の文字列マップにする
    pub fn named_locations(&self) -> BTreeMap<String, String> {
        self.named
            .iter()
            .map(|(name, ctx)| (name.clone(), ctx.location.clone()))
            .collect()
    }
}

/// git / http(s) のリモートコンテキストかどうか
pub fn is_remote_url(location: &str) -> bool {
    const PREFIXES: &[&str] = &["http://", "https://", "git://", "git@", "github.com/"];
    PREFIXES.iter().any(|p| location.starts_with(p))
}
