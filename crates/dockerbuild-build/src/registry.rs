//! レジストリのマニフェスト操作
//!
//! 取得は `oci-client` に任せ、DELETE だけ Registry HTTP API v2 を直接呼ぶ。

use crate::auth::{AuthMap, lookup};
use crate::error::{BuildError, Result};
use dockerbuild_core::Reference;
use oci_client::client::{ClientConfig, ClientProtocol};
use oci_client::errors::{OciDistributionError, OciErrorCode};
use oci_client::manifest::{ImageIndexEntry, OciManifest};
use oci_client::secrets::RegistryAuth;
use oci_client::{Client, RegistryOperation};
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};

const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.manifest.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json";

/// マニフェストが指すコンテンツ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub platform: Option<DescriptorPlatform>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorPlatform {
    pub architecture: String,
    pub os: String,
    #[serde(default)]
    pub variant: Option<String>,
}

impl Descriptor {
    /// `unknown/unknown` のアテステーションマニフェストか
    pub fn is_attestation(&self) -> bool {
        self.platform
            .as_ref()
            .is_some_and(|p| p.architecture == "unknown")
    }
}

impl From<&ImageIndexEntry> for Descriptor {
    fn from(entry: &ImageIndexEntry) -> Self {
        Self {
            media_type: entry.media_type.clone(),
            digest: entry.digest.clone(),
            size: u64::try_from(entry.size).unwrap_or_default(),
            platform: entry.platform.as_ref().map(|p| DescriptorPlatform {
                architecture: p.architecture.clone(),
                os: p.os.clone(),
                variant: p.variant.clone(),
            }),
        }
    }
}

/// マニフェストから記述子の一覧を作る
///
/// インデックスなら子マニフェストを、単一のマニフェストならそれ自身を返す。
pub fn descriptors(manifest: &OciManifest, digest: &str) -> Vec<Descriptor> {
    match manifest {
        OciManifest::ImageIndex(index) => index.manifests.iter().map(Descriptor::from).collect(),
        OciManifest::Image(_) => vec![Descriptor {
            media_type: manifest.content_type().to_string(),
            digest: digest.to_string(),
            size: 0,
            platform: None,
        }],
    }
}

/// HTTPで接続するローカルのレジストリか
fn is_insecure(domain: &str) -> bool {
    let host = domain.split(':').next().unwrap_or(domain);
    matches!(host, "localhost" | "127.0.0.1" | "[::1]")
}

/// レジストリAPIのベースURL
pub fn api_base(domain: &str) -> String {
    if domain == "docker.io" {
        return "https://registry-1.docker.io".to_string();
    }
    if is_insecure(domain) {
        format!("http://{}", domain)
    } else {
        format!("https://{}", domain)
    }
}

/// `oci-client` のエラーを分類する
fn registry_error(reference: &str, error: OciDistributionError) -> BuildError {
    let reference = reference.to_string();
    match error {
        OciDistributionError::ImageManifestNotFoundError(_) => BuildError::NotFound { reference },
        OciDistributionError::UnauthorizedError { .. } => BuildError::Unauthorized { reference },
        OciDistributionError::AuthenticationFailure(message) => BuildError::AuthFailed {
            registry: reference,
            message,
        },
        OciDistributionError::RegistryError { envelope, .. }
            if envelope.errors.iter().any(|e| {
                matches!(e.code, OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown)
            }) =>
        {
            BuildError::NotFound { reference }
        }
        OciDistributionError::RegistryError { envelope, .. }
            if envelope.errors.iter().any(|e| {
                matches!(e.code, OciErrorCode::Unauthorized | OciErrorCode::Denied)
            }) =>
        {
            BuildError::Unauthorized { reference }
        }
        OciDistributionError::ServerError { code, message, .. } => BuildError::Registry {
            reference,
            status: code,
            message,
        },
        other => BuildError::Registry {
            reference,
            status: 0,
            message: other.to_string(),
        },
    }
}

/// マニフェスト操作用のクライアント
pub struct RegistryClient {
    http: reqwest::Client,
    auths: AuthMap,
}

impl RegistryClient {
    pub fn new(auths: AuthMap) -> Self {
        Self {
            http: reqwest::Client::new(),
            auths,
        }
    }

    /// タグまたはダイジェストのマニフェストのダイジェストを取得
    pub async fn head_manifest(&self, reference: &str) -> Result<String> {
        let (client, image, auth) = self.prepare(reference)?;
        client
            .fetch_manifest_digest(&image, &auth)
            .await
            .map_err(|e| registry_error(reference, e))
    }

    /// マニフェストを取得して記述子の一覧を返す
    pub async fn get_manifest(&self, reference: &str) -> Result<Vec<Descriptor>> {
        let (client, image, auth) = self.prepare(reference)?;
        let (manifest, digest) = client
            .pull_manifest(&image, &auth)
            .await
            .map_err(|e| registry_error(reference, e))?;
        tracing::debug!(%reference, %digest, "fetched manifest");
        Ok(descriptors(&manifest, &digest))
    }

    /// マニフェストを削除する
    ///
    /// DELETE に対応していないレジストリでは警告を出して成功扱いにする。
    pub async fn delete_manifest(&self, reference: &str) -> Result<()> {
        let mut named = Reference::parse_normalized(reference)?;
        if named.digest().is_none() {
            let digest = self.head_manifest(reference).await?;
            named = named.with_digest(digest);
        }

        let (client, image, auth) = self.prepare(&named.to_string())?;
        let token = client
            .auth(&image, &auth, RegistryOperation::Push)
            .await
            .map_err(|e| registry_error(reference, e))?;

        let domain = named.domain();
        let digest = named.digest().unwrap_or_default();
        let url = format!("{}/v2/{}/manifests/{}", api_base(&domain), named.path(), digest);
        tracing::debug!(%url, "deleting manifest");

        let mut request = self.http.delete(&url).header(ACCEPT, MANIFEST_ACCEPT);
        request = match (token, &auth) {
            (Some(token), _) => request.bearer_auth(token),
            (None, RegistryAuth::Basic(username, password)) => {
                request.basic_auth(username, Some(password))
            }
            _ => request,
        };
        let response = request.send().await?;

        match response.status() {
            status if status.is_success() => {
                tracing::info!(reference = %named, "deleted manifest");
                Ok(())
            }
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::BAD_REQUEST => {
                tracing::warn!("this registry does not support deletions");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(BuildError::NotFound {
                reference: reference.to_string(),
            }),
            StatusCode::UNAUTHORIZED => Err(BuildError::Unauthorized {
                reference: reference.to_string(),
            }),
            status => Err(BuildError::Registry {
                reference: reference.to_string(),
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// 参照に合わせたクライアントと認証情報を用意する
    fn prepare(&self, reference: &str) -> Result<(Client, oci_client::Reference, RegistryAuth)> {
        let named = Reference::parse_normalized(reference)?;
        let domain = named.domain();
        let image: oci_client::Reference =
            named.to_string().parse().map_err(|e: oci_client::ParseError| {
                BuildError::Registry {
                    reference: reference.to_string(),
                    status: 0,
                    message: e.to_string(),
                }
            })?;

        let protocol = if is_insecure(&domain) {
            ClientProtocol::Http
        } else {
            ClientProtocol::Https
        };
        let client = Client::new(ClientConfig {
            protocol,
            ..Default::default()
        });
        Ok((client, image, registry_auth(&self.auths, &domain)))
    }
}

/// 重ね合わせた認証情報から `RegistryAuth` を作る
pub fn registry_auth(auths: &AuthMap, domain: &str) -> RegistryAuth {
    match lookup(auths, domain) {
        Some(auth) if !auth.username.is_empty() => {
            RegistryAuth::Basic(auth.username.clone(), auth.password.clone())
        }
        _ => RegistryAuth::Anonymous,
    }
}
