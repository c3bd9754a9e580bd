//! ビルドキャッシュのインポート元・エクスポート先

use super::{CacheMode, Compression};
use crate::defaults::{WithDefaults, default_from_env};
use crate::encoding::{Encode, join, kv, kv_bool};
use serde::{Deserialize, Serialize};
use std::fmt;

/// キャッシュのモード指定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheWithMode {
    /// エクスポートするレイヤーの範囲（デフォルト: min）
    #[serde(default)]
    pub mode: Option<CacheMode>,
}

impl WithDefaults for CacheWithMode {
    fn with_defaults(mut self) -> Self {
        self.mode.get_or_insert(CacheMode::Min);
        self
    }
}

impl Encode for CacheWithMode {
    fn encode(&self) -> String {
        self.mode.map(|m| format!("mode={m}")).unwrap_or_default()
    }
}

/// エクスポート失敗を無視するかどうか
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheWithIgnoreError {
    #[serde(default)]
    pub ignore_error: Option<bool>,
}

impl WithDefaults for CacheWithIgnoreError {
    fn with_defaults(mut self) -> Self {
        self.ignore_error.get_or_insert(false);
        self
    }
}

impl Encode for CacheWithIgnoreError {
    fn encode(&self) -> String {
        kv_bool("ignore-error", self.ignore_error)
    }
}

/// OCIメディアタイプの指定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheWithOci {
    /// OCIメディアタイプを使う（デフォルト: true）
    #[serde(default)]
    pub oci_media_types: Option<bool>,
    /// キャッシュをイメージマニフェストとして書き出す（デフォルト: false）
    #[serde(default)]
    pub image_manifest: Option<bool>,
}

impl WithDefaults for CacheWithOci {
    fn with_defaults(mut self) -> Self {
        self.oci_media_types.get_or_insert(true);
        self.image_manifest.get_or_insert(false);
        self
    }
}

impl Encode for CacheWithOci {
    fn encode(&self) -> String {
        match self.oci_media_types {
            Some(oci) => join([
                format!("oci-mediatypes={oci}"),
                kv_bool("image-manifest", self.image_manifest),
            ]),
            None => String::new(),
        }
    }
}

/// ローカルディレクトリからキャッシュを読む
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFromLocal {
    pub src: String,
    #[serde(default)]
    pub digest: Option<String>,
}

impl Encode for CacheFromLocal {
    fn encode(&self) -> String {
        join([
            "type=local".to_string(),
            kv("src", Some(&self.src)),
            kv("digest", self.digest.as_deref()),
        ])
    }
}

/// レジストリのイメージからキャッシュを読む
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFromRegistry {
    #[serde(rename = "ref")]
    pub reference: String,
}

impl Encode for CacheFromRegistry {
    fn encode(&self) -> String {
        join(["type=registry".to_string(), kv("ref", Some(&self.reference))])
    }
}

/// GitHub Actionsのキャッシュ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheFromGitHubActions {
    /// キャッシュサーバーのURL（デフォルト: $ACTIONS_RUNTIME_URL）
    #[serde(default)]
    pub url: Option<String>,
    /// アクセストークン（デフォルト: $ACTIONS_RUNTIME_TOKEN）
    #[serde(default)]
    pub token: Option<String>,
    /// キャッシュキーのスコープ（デフォルト: buildkit）
    #[serde(default)]
    pub scope: Option<String>,
}

impl WithDefaults for CacheFromGitHubActions {
    fn with_defaults(mut self) -> Self {
        default_from_env(&mut self.url, "ACTIONS_RUNTIME_URL");
        default_from_env(&mut self.token, "ACTIONS_RUNTIME_TOKEN");
        self.scope.get_or_insert_with(|| "buildkit".to_string());
        self
    }
}

impl Encode for CacheFromGitHubActions {
    fn encode(&self) -> String {
        join([
            "type=gha".to_string(),
            kv("scope", self.scope.as_deref()),
            kv("token", self.token.as_deref()),
            kv("url", self.url.as_deref()),
        ])
    }
}

/// Azure Blob Storageのキャッシュ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFromAzureBlob {
    pub name: String,
    #[serde(default)]
    pub account_url: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

impl Encode for CacheFromAzureBlob {
    fn encode(&self) -> String {
        join([
            "type=azblob".to_string(),
            kv("name", Some(&self.name)),
            kv("account_url", self.account_url.as_deref()),
            kv("secret_access_key", self.secret_access_key.as_deref()),
        ])
    }
}

/// S3互換ストレージのキャッシュ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFromS3 {
    /// リージョン（デフォルト: $AWS_REGION）
    #[serde(default)]
    pub region: Option<String>,
    pub bucket: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub blobs_prefix: Option<String>,
    #[serde(default)]
    pub manifests_prefix: Option<String>,
    #[serde(default)]
    pub use_path_style: Option<bool>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl WithDefaults for CacheFromS3 {
    fn with_defaults(mut self) -> Self {
        default_from_env(&mut self.region, "AWS_REGION");
        default_from_env(&mut self.access_key_id, "AWS_ACCESS_KEY_ID");
        default_from_env(&mut self.secret_access_key, "AWS_SECRET_ACCESS_KEY");
        default_from_env(&mut self.session_token, "AWS_SESSION_TOKEN");
        self
    }
}

impl Encode for CacheFromS3 {
    fn encode(&self) -> String {
        join([
            "type=s3".to_string(),
            kv("region", self.region.as_deref()),
            kv("bucket", Some(&self.bucket)),
            kv("name", self.name.as_deref()),
            kv("endpoint_url", self.endpoint_url.as_deref()),
            kv("blobs_prefix", self.blobs_prefix.as_deref()),
            kv("manifests_prefix", self.manifests_prefix.as_deref()),
            kv_bool("use_path_style", self.use_path_style),
            kv("access_key_id", self.access_key_id.as_deref()),
            kv("secret_access_key", self.secret_access_key.as_deref()),
            kv("session_token", self.session_token.as_deref()),
        ])
    }
}

/// キャッシュのインポート元（いずれか一つを指定する）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFrom {
    #[serde(default)]
    pub local: Option<CacheFromLocal>,
    #[serde(default)]
    pub registry: Option<CacheFromRegistry>,
    #[serde(default)]
    pub gha: Option<CacheFromGitHubActions>,
    #[serde(default)]
    pub azblob: Option<CacheFromAzureBlob>,
    #[serde(default)]
    pub s3: Option<CacheFromS3>,
    /// CLI形式の文字列をそのまま渡す
    #[serde(default)]
    pub raw: Option<String>,
    /// trueならこのエントリを無視する
    #[serde(default)]
    pub disabled: bool,
}

impl CacheFrom {
    /// 設定されているバリアントの数
    pub fn variant_count(&self) -> usize {
        [
            self.local.is_some(),
            self.registry.is_some(),
            self.gha.is_some(),
            self.azblob.is_some(),
            self.s3.is_some(),
            self.raw.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

impl WithDefaults for CacheFrom {
    fn with_defaults(mut self) -> Self {
        self.gha = self.gha.with_defaults();
        self.s3 = self.s3.with_defaults();
        self
    }
}

impl Encode for CacheFrom {
    fn encode(&self) -> String {
        if self.disabled {
            return String::new();
        }
        join([
            self.local.encode(),
            self.registry.encode(),
            self.gha.encode(),
            self.azblob.encode(),
            self.s3.encode(),
            self.raw.clone().unwrap_or_default(),
        ])
    }
}

impl fmt::Display for CacheFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// ビルド結果にキャッシュを埋め込む
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheToInline {}

impl Encode for CacheToInline {
    fn encode(&self) -> String {
        "type=inline".to_string()
    }
}

/// ローカルディレクトリへキャッシュを書き出す
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheToLocal {
    pub dest: String,
    #[serde(flatten)]
    pub compression: Compression,
    #[serde(flatten)]
    pub ignore_error: CacheWithIgnoreError,
    #[serde(flatten)]
    pub mode: CacheWithMode,
}

impl WithDefaults for CacheToLocal {
    fn with_defaults(mut self) -> Self {
        self.compression = self.compression.with_defaults();
        self.ignore_error = self.ignore_error.with_defaults();
        self.mode = self.mode.with_defaults();
        self
    }
}

impl Encode for CacheToLocal {
    fn encode(&self) -> String {
        join([
            "type=local".to_string(),
            kv("dest", Some(&self.dest)),
            self.compression.encode(),
            self.ignore_error.encode(),
            self.mode.encode(),
        ])
    }
}

/// レジストリへキャッシュをプッシュする
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheToRegistry {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(flatten)]
    pub mode: CacheWithMode,
    #[serde(flatten)]
    pub ignore_error: CacheWithIgnoreError,
    #[serde(flatten)]
    pub oci: CacheWithOci,
    #[serde(flatten)]
    pub compression: Compression,
}

impl WithDefaults for CacheToRegistry {
    fn with_defaults(mut self) -> Self {
        self.mode = self.mode.with_defaults();
        self.ignore_error = self.ignore_error.with_defaults();
        self.oci = self.oci.with_defaults();
        self.compression = self.compression.with_defaults();
        self
    }
}

impl Encode for CacheToRegistry {
    fn encode(&self) -> String {
        join([
            "type=registry".to_string(),
            kv("ref", Some(&self.reference)),
            self.mode.encode(),
            self.ignore_error.encode(),
            self.oci.encode(),
            self.compression.encode(),
        ])
    }
}

/// モードとエラー無視を持つキャッシュ出力の共通形
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheToBackend<T> {
    #[serde(flatten)]
    pub backend: T,
    #[serde(flatten)]
    pub mode: CacheWithMode,
    #[serde(flatten)]
    pub ignore_error: CacheWithIgnoreError,
}

impl<T> CacheToBackend<T> {
    pub fn new(backend: T) -> Self {
        Self {
            backend,
            mode: CacheWithMode::default(),
            ignore_error: CacheWithIgnoreError::default(),
        }
    }
}

impl<T: WithDefaults> WithDefaults for CacheToBackend<T> {
    fn with_defaults(mut self) -> Self {
        self.backend = self.backend.with_defaults();
        self.mode = self.mode.with_defaults();
        self.ignore_error = self.ignore_error.with_defaults();
        self
    }
}

impl<T: Encode> Encode for CacheToBackend<T> {
    fn encode(&self) -> String {
        join([
            self.backend.encode(),
            self.mode.encode(),
            self.ignore_error.encode(),
        ])
    }
}

impl WithDefaults for CacheFromAzureBlob {
    fn with_defaults(self) -> Self {
        self
    }
}

pub type CacheToGitHubActions = CacheToBackend<CacheFromGitHubActions>;
pub type CacheToAzureBlob = CacheToBackend<CacheFromAzureBlob>;
pub type CacheToS3 = CacheToBackend<CacheFromS3>;

/// キャッシュのエクスポート先（いずれか一つを指定する）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheTo {
    #[serde(default)]
    pub inline: Option<CacheToInline>,
    #[serde(default)]
    pub local: Option<CacheToLocal>,
    #[serde(default)]
    pub registry: Option<CacheToRegistry>,
    #[serde(default)]
    pub gha: Option<CacheToGitHubActions>,
    #[serde(default)]
    pub azblob: Option<CacheToAzureBlob>,
    #[serde(default)]
    pub s3: Option<CacheToS3>,
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl CacheTo {
    pub fn variant_count(&self) -> usize {
        [
            self.inline.is_some(),
            self.local.is_some(),
            self.registry.is_some(),
            self.gha.is_some(),
            self.azblob.is_some(),
            self.s3.is_some(),
            self.raw.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

impl WithDefaults for CacheTo {
    fn with_defaults(mut self) -> Self {
        self.local = self.local.with_defaults();
        self.registry = self.registry.with_defaults();
        self.gha = self.gha.with_defaults();
        self.azblob = self.azblob.with_defaults();
        self.s3 = self.s3.with_defaults();
        self
    }
}

impl Encode for CacheTo {
    fn encode(&self) -> String {
        if self.disabled {
            return String::new();
        }
        join([
            self.inline.encode(),
            self.local.encode(),
            self.registry.encode(),
            self.gha.encode(),
            self.azblob.encode(),
            self.s3.encode(),
            self.raw.clone().unwrap_or_default(),
        ])
    }
}

impl fmt::Display for CacheTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CompressionType;

    #[test]
    fn test_cache_from_strings() {
        let cases = [
            (
                CacheFrom {
                    local: Some(CacheFromLocal {
                        src: "/foo/bar".into(),
                        digest: Some("sha256:abc".into()),
                    }),
                    ..Default::default()
                },
                "type=local,src=/foo/bar,digest=sha256:abc",
            ),
            (
                CacheFrom {
                    registry: Some(CacheFromRegistry {
                        reference: "docker.io/foo/bar:cache".into(),
                    }),
                    ..Default::default()
                },
                "type=registry,ref=docker.io/foo/bar:cache",
            ),
            (
                CacheFrom {
                    gha: Some(CacheFromGitHubActions {
                        url: Some("https://github.com/user/repo".into()),
                        token: Some("token".into()),
                        scope: None,
                    }),
                    ..Default::default()
                },
                "type=gha,token=token,url=https://github.com/user/repo",
            ),
            (
                CacheFrom {
                    azblob: Some(CacheFromAzureBlob {
                        name: "bar".into(),
                        account_url: Some("https://foo.blob.core.windows.net".into()),
                        secret_access_key: None,
                    }),
                    ..Default::default()
                },
                "type=azblob,name=bar,account_url=https://foo.blob.core.windows.net",
            ),
            (
                CacheFrom {
                    raw: Some("type=registry,ref=raw".into()),
                    ..Default::default()
                },
                "type=registry,ref=raw",
            ),
        ];

        for (cache, want) in cases {
            assert_eq!(cache.to_string(), want);
        }
    }

    #[test]
    fn test_cache_from_s3() {
        let cache = CacheFrom {
            s3: Some(CacheFromS3 {
                region: Some("us-west-2".into()),
                bucket: "bucket-foo".into(),
                name: Some("myname".into()),
                endpoint_url: Some("https://some.endpoint".into()),
                blobs_prefix: Some("blob-prefix".into()),
                manifests_prefix: Some("manifest-prefix".into()),
                use_path_style: Some(true),
                access_key_id: Some("access-key-id".into()),
                secret_access_key: Some("secret-key".into()),
                session_token: Some("session".into()),
            }),
            ..Default::default()
        };
        assert_eq!(
            cache.to_string(),
            "type=s3,region=us-west-2,bucket=bucket-foo,name=myname,\
             endpoint_url=https://some.endpoint,blobs_prefix=blob-prefix,\
             manifests_prefix=manifest-prefix,use_path_style=true,\
             access_key_id=access-key-id,secret_access_key=secret-key,\
             session_token=session"
        );
    }

    #[test]
    fn test_disabled_cache_is_empty() {
        let cache = CacheFrom {
            registry: Some(CacheFromRegistry {
                reference: "foo".into(),
            }),
            disabled: true,
            ..Default::default()
        };
        assert_eq!(cache.to_string(), "");

        let cache = CacheTo {
            inline: Some(CacheToInline {}),
            disabled: true,
            ..Default::default()
        };
        assert_eq!(cache.to_string(), "");
    }

    #[test]
    fn test_cache_to_strings() {
        let inline = CacheTo {
            inline: Some(CacheToInline {}),
            ..Default::default()
        };
        assert_eq!(inline.to_string(), "type=inline");

        let local = CacheTo {
            local: Some(CacheToLocal {
                dest: "/foo".into(),
                compression: Compression {
                    compression: Some(CompressionType::Gzip),
                    compression_level: Some(100),
                    force_compression: Some(true),
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            local.to_string(),
            "type=local,dest=/foo,compression=gzip,compression-level=22,force-compression=true"
        );

        let registry = CacheTo {
            registry: Some(CacheToRegistry {
                reference: "docker.io/foo/bar:baz".into(),
                oci: CacheWithOci {
                    oci_media_types: Some(true),
                    image_manifest: Some(true),
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            registry.to_string(),
            "type=registry,ref=docker.io/foo/bar:baz,oci-mediatypes=true,image-manifest=true"
        );

        let azblob = CacheTo {
            azblob: Some(CacheToAzureBlob {
                ignore_error: CacheWithIgnoreError {
                    ignore_error: Some(true),
                },
                ..CacheToBackend::new(CacheFromAzureBlob::default())
            }),
            ..Default::default()
        };
        assert_eq!(azblob.to_string(), "type=azblob,ignore-error=true");

        let gha = CacheTo {
            gha: Some(CacheToGitHubActions {
                mode: CacheWithMode {
                    mode: Some(CacheMode::Max),
                },
                ..CacheToBackend::new(CacheFromGitHubActions {
                    scope: Some("main".into()),
                    ..Default::default()
                })
            }),
            ..Default::default()
        };
        assert_eq!(gha.to_string(), "type=gha,scope=main,mode=max");
    }

    #[test]
    fn test_gha_defaults_from_env() {
        temp_env::with_vars(
            [
                ("ACTIONS_RUNTIME_URL", Some("https://cache.example")),
                ("ACTIONS_RUNTIME_TOKEN", None::<&str>),
            ],
            || {
                let gha = CacheFromGitHubActions::default().with_defaults();
                assert_eq!(gha.url.as_deref(), Some("https://cache.example"));
                assert_eq!(gha.token.as_deref(), Some(""));
                assert_eq!(gha.scope.as_deref(), Some("buildkit"));

                let explicit = CacheFromGitHubActions {
                    url: Some("https://mine".into()),
                    ..Default::default()
                }
                .with_defaults();
                assert_eq!(explicit.url.as_deref(), Some("https://mine"));
            },
        );
    }

    #[test]
    fn test_s3_defaults_from_env() {
        temp_env::with_vars(
            [
                ("AWS_REGION", Some("eu-west-1")),
                ("AWS_ACCESS_KEY_ID", Some("akid")),
                ("AWS_SECRET_ACCESS_KEY", Some("secret")),
                ("AWS_SESSION_TOKEN", None),
            ],
            || {
                let s3 = CacheFromS3 {
                    bucket: "b".into(),
                    ..Default::default()
                }
                .with_defaults();
                assert_eq!(s3.region.as_deref(), Some("eu-west-1"));
                assert_eq!(s3.access_key_id.as_deref(), Some("akid"));
                assert_eq!(s3.secret_access_key.as_deref(), Some("secret"));
                assert_eq!(s3.session_token.as_deref(), Some(""));
            },
        );
    }

    #[test]
    fn test_cache_to_defaults_idempotent() {
        let cache = CacheTo {
            registry: Some(CacheToRegistry {
                reference: "r".into(),
                mode: CacheWithMode {
                    mode: Some(CacheMode::Max),
                },
                ..Default::default()
            }),
            ..Default::default()
        };
        let once = cache.with_defaults();
        let registry = once.registry.clone().unwrap();
        assert_eq!(registry.mode.mode, Some(CacheMode::Max));
        assert_eq!(registry.ignore_error.ignore_error, Some(false));
        assert_eq!(registry.oci.oci_media_types, Some(true));
        assert_eq!(registry.oci.image_manifest, Some(false));
        assert_eq!(registry.compression.compression, Some(CompressionType::Gzip));
        assert_eq!(once.clone().with_defaults(), once);
    }

    #[test]
    fn test_variant_count() {
        let cache = CacheTo {
            inline: Some(CacheToInline {}),
            raw: Some("type=inline".into()),
            ..Default::default()
        };
        assert_eq!(cache.variant_count(), 2);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let yaml = r#"
registry:
  ref: docker.io/foo/bar:cache
  mode: max
  ociMediaTypes: false
  compressionLevel: 5
"#;
        let cache: CacheTo = serde_yaml::from_str(yaml).unwrap();
        let registry = cache.registry.unwrap();
        assert_eq!(registry.reference, "docker.io/foo/bar:cache");
        assert_eq!(registry.mode.mode, Some(CacheMode::Max));
        assert_eq!(registry.oci.oci_media_types, Some(false));
        assert_eq!(registry.compression.compression_level, Some(5));
    }
}
