//! Imageリソースの引数と状態

use super::{
    BuildContext, BuilderConfig, CacheFrom, CacheTo, Dockerfile, Export, NetworkMode, Platform,
    Registry, Ssh,
};
use crate::defaults::WithDefaults;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// イメージビルドの入力
///
/// YAML形式：
/// ```yaml
/// context:
///   location: ./app
/// tags: ["docker.io/me/app:latest"]
/// push: true
/// platforms: [linux/amd64]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageArgs {
    /// `/etc/hosts` に追加するエントリ（`host:ip`）
    #[serde(default)]
    pub add_hosts: Vec<String>,
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
    /// プレビュー時にもビルドする（デフォルト: true）
    #[serde(default)]
    pub build_on_preview: Option<bool>,
    #[serde(default)]
    pub builder: Option<BuilderConfig>,
    #[serde(default)]
    pub cache_from: Vec<CacheFrom>,
    #[serde(default)]
    pub cache_to: Vec<CacheTo>,
    #[serde(default)]
    pub context: Option<BuildContext>,
    #[serde(default)]
    pub dockerfile: Option<Dockerfile>,
    #[serde(default)]
    pub exports: Vec<Export>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// `--load` の短縮形
    #[serde(default)]
    pub load: bool,
    /// ネットワークモード（デフォルト: default）
    #[serde(default)]
    pub network: Option<NetworkMode>,
    #[serde(default)]
    pub no_cache: bool,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    /// 参照するイメージを常にpullする
    #[serde(default)]
    pub pull: bool,
    /// `--push` の短縮形
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub registries: Vec<Registry>,
    /// ビルドに公開するシークレット（`RUN --mount=type=secret,id=..`）
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    #[serde(default)]
    pub ssh: Vec<Ssh>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub target: Option<String>,
    /// デーモンAPIを使わず常にbuildx CLIでビルドする
    #[serde(default)]
    pub exec: bool,
}

impl ImageArgs {
    /// レジストリへプッシュするかどうか
    pub fn is_exported(&self) -> bool {
        self.push || self.exports.iter().any(Export::pushed)
    }

    pub fn should_build_on_preview(&self) -> bool {
        self.build_on_preview.unwrap_or(true)
    }

    pub fn context_location(&self) -> &str {
        self.context
            .as_ref()
            .map(|c| c.location.as_str())
            .unwrap_or_default()
    }

    pub fn dockerfile_location(&self) -> Option<&str> {
        self.dockerfile.as_ref().and_then(Dockerfile::location)
    }

    pub fn named_contexts(&self) -> BTreeMap<String, String> {
        self.context
            .as_ref()
            .map(BuildContext::named_locations)
            .unwrap_or_default()
    }

    pub fn builder_name(&self) -> Option<&str> {
        self.builder.as_ref().and_then(BuilderConfig::name)
    }
}

impl WithDefaults for ImageArgs {
    fn with_defaults(mut self) -> Self {
        self.build_on_preview.get_or_insert(true);
        self.network.get_or_insert(NetworkMode::Default);
        self.cache_from = self.cache_from.with_defaults();
        self.cache_to = self.cache_to.with_defaults();
        self.exports = self.exports.with_defaults();
        self
    }
}

/// イメージビルドの結果（入力と出力）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageState {
    #[serde(flatten)]
    pub args: ImageArgs,
    /// エクスポートされたイメージのSHA256ダイジェスト
    #[serde(default)]
    pub digest: String,
    /// ビルドコンテキストのハッシュ
    #[serde(default)]
    pub context_hash: String,
    /// `tag@digest` 形式の参照（プッシュしていなければタグのみ）
    #[serde(default, rename = "ref")]
    pub reference: String,
}

impl ImageState {
    pub fn new(args: ImageArgs) -> Self {
        Self {
            args,
            ..Default::default()
        }
    }
}
