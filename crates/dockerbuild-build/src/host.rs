//! ホスト単位の状態
//!
//! ホストの認証情報とビルダーの検索結果を、プロセス内のすべてのリソースで共有する。

use crate::auth::{AuthMap, RegistryAuth};
use crate::buildx::{BuilderInfo, Buildx};
use crate::error::{BuildError, Result};
use bollard::Docker;
use dockerbuild_config::ProviderConfig;
use dockerbuild_core::Build;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

const CONNECT_TIMEOUT_SECS: u64 = 120;

pub struct Host {
    config: ProviderConfig,
    auths: AuthMap,
    buildx: Buildx,
    builders: Mutex<HashMap<String, BuilderInfo>>,
    /// BuildKit v0.13 以降ならtrue（ビルダーを起動したときに決まる）
    supports_multiple_exports: AtomicBool,
}

impl Host {
    /// ホストの Docker 設定から認証情報を読み込む
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Self::with_auth(config, RegistryAuth::new())
    }

    pub fn with_auth(config: ProviderConfig, auth: RegistryAuth) -> Result<Self> {
        let auths = auth.load_all()?;
        let buildx = Buildx::new(
            config.host().map(str::to_string),
            auth.config_dir().to_path_buf(),
        );
        Ok(Self {
            config,
            auths,
            buildx,
            builders: Mutex::new(HashMap::new()),
            supports_multiple_exports: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// ホストに保存されている認証情報
    pub fn auths(&self) -> &AuthMap {
        &self.auths
    }

    pub fn buildx(&self) -> &Buildx {
        &self.buildx
    }

    pub fn supports_multiple_exports(&self) -> bool {
        self.supports_multiple_exports.load(Ordering::Relaxed)
    }

    /// Docker デーモンへ接続する
    pub fn docker(&self) -> Result<Docker> {
        let docker = match self.config.host() {
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, CONNECT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)?
            }
            Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
                Docker::connect_with_http(host, CONNECT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)?
            }
            Some(host) => {
                tracing::warn!(host, "unsupported docker host scheme, using local defaults");
                Docker::connect_with_local_defaults()?
            }
            None => Docker::connect_with_local_defaults()?,
        };
        Ok(docker)
    }

    /// BuildKit が使えるか
    ///
    /// `DOCKER_BUILDKIT` が設定されていればそれに従う。Windows デーモンは非対応。
    pub async fn buildkit_enabled(&self) -> Result<bool> {
        if let Some(enabled) = buildkit_from_env() {
            return Ok(enabled);
        }

        let docker = match self.docker() {
            Ok(docker) => docker,
            Err(e) => {
                tracing::debug!("skipping daemon check: {}", e);
                return Ok(true);
            }
        };
        match docker.version().await {
            Ok(version) => Ok(version.os.as_deref() != Some("windows")),
            Err(e) => {
                tracing::debug!("skipping daemon check: {}", e);
                Ok(true)
            }
        }
    }

    /// ビルダーを探す（ビルダー名ごとに一度だけ）
    ///
    /// 既定のビルダーが使えない場合は docker-container ドライバーのビルダーを作る。
    pub async fn builder_for(&self, build: &Build) -> Result<BuilderInfo> {
        let mut builders = self.builders.lock().await;

        let requested = build.opts.builder.clone().unwrap_or_default();
        if let Some(cached) = builders.get(&requested) {
            return Ok(cached.clone());
        }

        let info = match self.buildx.inspect(build.opts.builder.as_deref()).await {
            Ok(info) => info,
            Err(e) if requested.is_empty() => {
                tracing::warn!("default builder is unavailable, creating one: {}", e);
                let name = self.buildx.create_container_builder().await?;
                self.buildx.inspect(Some(&name)).await?
            }
            Err(e) => {
                return Err(BuildError::Builder {
                    name: requested,
                    message: e.to_string(),
                });
            }
        };

        tracing::debug!(
            builder = %info.name,
            driver = %info.driver,
            buildkit = ?info.buildkit_version,
            "using builder"
        );
        if info.buildkit_version.is_some() {
            self.supports_multiple_exports
                .store(info.supports_multiple_exports(), Ordering::Relaxed);
        }

        builders.insert(requested, info.clone());
        Ok(info)
    }
}

fn buildkit_from_env() -> Option<bool> {
    let value = std::env::var("DOCKER_BUILDKIT").ok().filter(|v| !v.is_empty())?;
    Some(parse_bool(&value).unwrap_or_else(|| {
        tracing::warn!(%value, "invalid DOCKER_BUILDKIT value");
        true
    }))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}
