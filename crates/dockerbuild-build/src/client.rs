//! Docker とレジストリへのすべての呼び出し

use crate::auth::{AuthMap, layer};
use crate::builder::DaemonBuilder;
use crate::error::Result;
use crate::host::Host;
use crate::registry::{Descriptor, RegistryClient};
use async_trait::async_trait;
use dockerbuild_core::{Build, ImageArgs, IndexArgs, Reference, Registry};
use std::collections::BTreeMap;
use std::sync::Arc;

/// エクスポーターが返すイメージダイジェストのキー
pub const IMAGE_DIGEST_KEY: &str = "containerimage.digest";

/// ビルド結果（エクスポーターのレスポンス）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveResponse {
    pub exporter_response: BTreeMap<String, String>,
}

impl SolveResponse {
    pub fn digest(&self) -> Option<&str> {
        self.exporter_response
            .get(IMAGE_DIGEST_KEY)
            .map(String::as_str)
            .filter(|d| !d.is_empty())
    }
}

/// リソースのライフサイクルが使う操作
#[async_trait]
pub trait Client: Send + Sync {
    /// BuildKit でビルドする
    async fn build(&self, build: &Build) -> Result<SolveResponse>;

    async fn buildkit_enabled(&self) -> Result<bool>;

    /// 参照先のマニフェスト（インデックスなら子マニフェスト）を取得
    async fn inspect(&self, reference: &str) -> Result<Vec<Descriptor>>;

    /// ローカルのイメージと、ダイジェスト付きならレジストリのマニフェストを削除
    async fn delete(&self, reference: &str) -> Result<()>;

    async fn manifest_create(&self, push: bool, target: &str, refs: &[String]) -> Result<()>;

    /// タグのダイジェストを取得
    async fn manifest_inspect(&self, target: &str) -> Result<String>;

    async fn manifest_delete(&self, target: &str) -> Result<()>;
}

/// ホストの認証情報にリソースの認証情報を重ねたクライアント
pub struct DockerClient {
    host: Arc<Host>,
    auths: AuthMap,
}

impl DockerClient {
    /// ホスト、プロバイダー設定、`registries` の順に認証情報を重ねる
    pub fn new(host: Arc<Host>, registries: &[Registry]) -> Self {
        let mut layered: Vec<Registry> = host.config().registries.clone();
        layered.extend(registries.iter().cloned());
        let auths = layer(host.auths(), &layered);
        Self { host, auths }
    }

    pub fn for_image(host: Arc<Host>, args: &ImageArgs) -> Self {
        Self::new(host, &args.registries)
    }

    pub fn for_index(host: Arc<Host>, args: &IndexArgs) -> Self {
        let registries: Vec<Registry> = args.registry.iter().cloned().collect();
        Self::new(host, &registries)
    }

    pub fn auths(&self) -> &AuthMap {
        &self.auths
    }

    fn registry(&self) -> RegistryClient {
        RegistryClient::new(self.auths.clone())
    }
}

#[async_trait]
impl Client for DockerClient {
    async fn build(&self, build: &Build) -> Result<SolveResponse> {
        if DaemonBuilder::supports(build) {
            tracing::debug!("building with the docker daemon");
            let builder = DaemonBuilder::new(self.host.docker()?);
            return builder.build(build, &self.auths).await;
        }

        let builder = self.host.builder_for(build).await?;
        tracing::info!(
            "building with {:?} instance using {} driver",
            builder.name,
            builder.driver
        );
        if build.opts.exports.len() > 1 && !self.host.supports_multiple_exports() {
            tracing::warn!("the builder's BuildKit version does not support multiple exports");
        }
        self.host
            .buildx()
            .build(build, &builder.name, &self.auths)
            .await
    }

    async fn buildkit_enabled(&self) -> Result<bool> {
        self.host.buildkit_enabled().await
    }

    async fn inspect(&self, reference: &str) -> Result<Vec<Descriptor>> {
        self.registry().get_manifest(reference).await
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        let digest = Reference::parse_normalized(reference)
            .ok()
            .and_then(|r| r.digest().map(str::to_string));

        if let Ok(docker) = self.host.docker() {
            let daemon = DaemonBuilder::new(docker);
            if let Err(e) = daemon.remove(reference).await {
                tracing::debug!("local image not removed: {}", e);
                // デーモンでビルドした場合のダイジェストはイメージID
                if let Some(id) = &digest {
                    daemon.remove(id).await.ok();
                }
            }
        }

        // レジストリから消すにはダイジェストが必要
        if digest.is_none() {
            return Ok(());
        }
        self.registry().delete_manifest(reference).await
    }

    async fn manifest_create(&self, push: bool, target: &str, refs: &[String]) -> Result<()> {
        self.host
            .buildx()
            .imagetools_create(push, target, refs, &self.auths)
            .await
    }

    async fn manifest_inspect(&self, target: &str) -> Result<String> {
        self.registry().head_manifest(target).await
    }

    async fn manifest_delete(&self, target: &str) -> Result<()> {
        self.registry().delete_manifest(target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{DOCKER_HUB_KEY, RegistryAuth};
    use dockerbuild_config::ProviderConfig;

    fn registry(address: &str, username: &str) -> Registry {
        Registry {
            address: address.into(),
            username: Some(username.into()),
            password: Some("secret".into()),
        }
    }

    fn host(registries: Vec<Registry>) -> Arc<Host> {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig {
            host: None,
            registries,
        };
        Arc::new(
            Host::with_auth(config, RegistryAuth::with_config_dir(dir.path().to_path_buf()))
                .unwrap(),
        )
    }

    #[test]
    fn test_solve_response_digest() {
        let mut response = SolveResponse::default();
        assert_eq!(response.digest(), None);
        response
            .exporter_response
            .insert(IMAGE_DIGEST_KEY.into(), "sha256:abc".into());
        assert_eq!(response.digest(), Some("sha256:abc"));
    }

    #[test]
    fn test_resource_registries_override_provider() {
        let host = host(vec![registry("ghcr.io", "provider"), registry("docker.io", "hub")]);
        let args = ImageArgs {
            registries: vec![registry("ghcr.io", "resource")],
            ..Default::default()
        };

        let client = DockerClient::for_image(host, &args);
        assert_eq!(client.auths()["ghcr.io"].username, "resource");
        assert_eq!(client.auths()[DOCKER_HUB_KEY].username, "hub");
    }

    #[test]
    fn test_index_registry() {
        let host = host(vec![]);
        let args = IndexArgs {
            registry: Some(registry("quay.io", "me")),
            ..Default::default()
        };
        let client = DockerClient::for_index(host, &args);
        assert_eq!(client.auths()["quay.io"].username, "me");
    }
}
