//! ビルド結果のエクスポート先

use super::Compression;
use crate::defaults::WithDefaults;
use crate::encoding::{Encode, annotations, join, kv, kv_bool, names};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// エクスポート共通のオプション（メディアタイプ・圧縮・名前・アノテーション）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    /// OCIメディアタイプを使う
    #[serde(default)]
    pub oci_media_types: Option<bool>,
    #[serde(flatten)]
    pub compression: Compression,
    /// イメージ名（複数可）
    #[serde(default)]
    pub names: Vec<String>,
    /// マニフェストに付与するアノテーション
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl ExportOptions {
    fn with_defaults(mut self, oci: bool) -> Self {
        self.oci_media_types.get_or_insert(oci);
        self.compression = self.compression.with_defaults();
        self
    }

    fn encode_oci(&self) -> String {
        kv_bool("oci-mediatypes", self.oci_media_types)
    }
}

/// tarボールとして書き出す
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTar {
    pub dest: String,
}

impl Encode for ExportTar {
    fn encode(&self) -> String {
        join(["type=tar".to_string(), kv("dest", Some(&self.dest))])
    }
}

/// ローカルディレクトリへ書き出す
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLocal {
    pub dest: String,
}

impl Encode for ExportLocal {
    fn encode(&self) -> String {
        join(["type=local".to_string(), kv("dest", Some(&self.dest))])
    }
}

/// Docker形式のtarボール（またはデーモンへのロード）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocker {
    /// 書き出し先（省略時はデーモンへロード）
    #[serde(default)]
    pub dest: Option<String>,
    /// tarボールとして束ねる（デフォルト: true）
    #[serde(default)]
    pub tar: Option<bool>,
    #[serde(flatten)]
    pub options: ExportOptions,
}

impl ExportDocker {
    fn encode_as(&self, ty: &str) -> String {
        join([
            format!("type={ty}"),
            kv("dest", self.dest.as_deref()),
            kv_bool("tar", self.tar),
            self.options.encode_oci(),
            self.options.compression.encode(),
            annotations(&self.options.annotations),
            names(&self.options.names),
        ])
    }

    fn with_defaults_oci(mut self, oci: bool) -> Self {
        self.options = self.options.with_defaults(oci);
        self.tar.get_or_insert(true);
        self
    }
}

impl WithDefaults for ExportDocker {
    fn with_defaults(self) -> Self {
        self.with_defaults_oci(false)
    }
}

impl Encode for ExportDocker {
    fn encode(&self) -> String {
        self.encode_as("docker")
    }
}

/// OCI形式のtarボール
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportOci(pub ExportDocker);

impl WithDefaults for ExportOci {
    fn with_defaults(self) -> Self {
        Self(self.0.with_defaults_oci(true))
    }
}

impl Encode for ExportOci {
    fn encode(&self) -> String {
        self.0.encode_as("oci")
    }
}

/// コンテナイメージとして出力する
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportImage {
    #[serde(default)]
    pub push: Option<bool>,
    #[serde(default)]
    pub push_by_digest: Option<bool>,
    /// 安全でないレジストリへのプッシュを許可する
    #[serde(default)]
    pub insecure: Option<bool>,
    #[serde(default)]
    pub dangling_name_prefix: Option<String>,
    #[serde(default)]
    pub name_canonical: Option<bool>,
    #[serde(default)]
    pub unpack: Option<bool>,
    /// イメージストアに保存する（デフォルト: true）
    #[serde(default)]
    pub store: Option<bool>,
    #[serde(flatten)]
    pub options: ExportOptions,
}

impl ExportImage {
    fn encode_as(&self, ty: &str) -> String {
        join([
            format!("type={ty}"),
            kv_bool("push", self.push),
            kv_bool("push-by-digest", self.push_by_digest),
            kv_bool("insecure", self.insecure),
            kv("dangling-name-prefix", self.dangling_name_prefix.as_deref()),
            kv_bool("name-canonical", self.name_canonical),
            kv_bool("unpack", self.unpack),
            kv_bool("store", self.store),
            self.options.encode_oci(),
            self.options.compression.encode(),
            names(&self.options.names),
            annotations(&self.options.annotations),
        ])
    }
}

impl WithDefaults for ExportImage {
    fn with_defaults(mut self) -> Self {
        self.options = self.options.with_defaults(false);
        self.store.get_or_insert(true);
        self
    }
}

impl Encode for ExportImage {
    fn encode(&self) -> String {
        self.encode_as("image")
    }
}

/// イメージを出力してレジストリへプッシュする
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportRegistry(pub ExportImage);

impl WithDefaults for ExportRegistry {
    fn with_defaults(self) -> Self {
        let mut image = self.0.with_defaults();
        image.push.get_or_insert(true);
        Self(image)
    }
}

impl Encode for ExportRegistry {
    fn encode(&self) -> String {
        self.0.encode_as("registry")
    }
}

/// キャッシュのみをエクスポートする
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportCacheOnly {}

impl Encode for ExportCacheOnly {
    fn encode(&self) -> String {
        "type=cacheonly".to_string()
    }
}

/// エクスポート先（いずれか一つを指定する）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    #[serde(default)]
    pub tar: Option<ExportTar>,
    #[serde(default)]
    pub local: Option<ExportLocal>,
    #[serde(default)]
    pub registry: Option<ExportRegistry>,
    #[serde(default)]
    pub image: Option<ExportImage>,
    #[serde(default)]
    pub oci: Option<ExportOci>,
    #[serde(default)]
    pub docker: Option<ExportDocker>,
    #[serde(default)]
    pub cacheonly: Option<ExportCacheOnly>,
    /// CLI形式の文字列をそのまま渡す
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl Export {
    /// レジストリへプッシュするエクスポート
    pub fn registry() -> Self {
        Self {
            registry: Some(ExportRegistry::default()),
            ..Default::default()
        }
    }

    /// Dockerデーモンへロードするエクスポート
    pub fn docker() -> Self {
        Self {
            docker: Some(ExportDocker::default()),
            ..Default::default()
        }
    }

    pub fn variant_count(&self) -> usize {
        [
            self.tar.is_some(),
            self.local.is_some(),
            self.registry.is_some(),
            self.image.is_some(),
            self.oci.is_some(),
            self.docker.is_some(),
            self.cacheonly.is_some(),
            self.raw.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    /// このエクスポートがレジストリへプッシュするかどうか
    pub fn pushed(&self) -> bool {
        if self.disabled {
            return false;
        }
        if let Some(registry) = &self.registry {
            return registry.0.push.unwrap_or(true);
        }
        if let Some(image) = &self.image {
            return image.push.unwrap_or(false);
        }
        if let Some(raw) = &self.raw {
            return crate::entry::parse_export(raw)
                .map(|e| e.is_registry_push())
                .unwrap_or(false);
        }
        false
    }
}

impl WithDefaults for Export {
    fn with_defaults(mut self) -> Self {
        self.docker = self.docker.with_defaults();
        self.image = self.image.with_defaults();
        self.oci = self.oci.with_defaults();
        self.registry = self.registry.with_defaults();
        self
    }
}

impl Encode for Export {
    fn encode(&self) -> String {
        if self.disabled {
            return String::new();
        }
        join([
            self.tar.encode(),
            self.local.encode(),
            self.registry.encode(),
            self.image.encode(),
            self.oci.encode(),
            self.docker.encode(),
            self.cacheonly.encode(),
            self.raw.clone().unwrap_or_default(),
        ])
    }
}

impl fmt::Display for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
