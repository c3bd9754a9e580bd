//! 検証済みのビルド指定

use crate::entry::{CacheEntry, ExportEntry};
use crate::model::{NetworkMode, Platform, Ssh};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// ビルダーへ渡す検証済みのオプション
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildOptions {
    pub build_args: BTreeMap<String, String>,
    pub builder: Option<String>,
    pub cache_from: Vec<CacheEntry>,
    pub cache_to: Vec<CacheEntry>,
    pub context_path: String,
    pub dockerfile: Option<String>,
    pub exports: Vec<ExportEntry>,
    pub extra_hosts: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub network: NetworkMode,
    pub no_cache: bool,
    pub named_contexts: BTreeMap<String, String>,
    pub platforms: Vec<Platform>,
    pub pull: bool,
    /// シークレットのID（値は `Build::secrets` が持つ）
    pub secret_ids: Vec<String>,
    pub ssh: Vec<Ssh>,
    pub tags: Vec<String>,
    pub target: Option<String>,
}

impl BuildOptions {
    /// レジストリへプッシュするエクスポートがあるか
    pub fn pushes(&self) -> bool {
        self.exports.iter().any(ExportEntry::is_registry_push)
    }
}

/// 1回のビルドに必要なすべての情報
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Build {
    pub opts: BuildOptions,
    pub secrets: BTreeMap<String, String>,
    /// インラインのDockerfile
    pub inline: Option<String>,
    /// buildx CLIでのビルドを強制する
    pub exec: bool,
}

impl Build {
    pub fn should_exec(&self) -> bool {
        self.exec
    }
}

// シークレットの値をログに出さない
impl fmt::Debug for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Build")
            .field("opts", &self.opts)
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .field("inline", &self.inline.is_some())
            .field("exec", &self.exec)
            .finish()
    }
}
