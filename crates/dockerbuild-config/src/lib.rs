//! dockerbuild のプロバイダー設定
//!
//! デーモンの接続先と、すべてのビルドで使うレジストリ認証情報を保持する。

pub mod error;

pub use error::*;

use dockerbuild_core::Registry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 設定ファイルのパスを直接指定する環境変数
pub const CONFIG_ENV: &str = "DOCKERBUILD_CONFIG";

const CANDIDATES: [&str; 2] = ["dockerbuild.yaml", ".dockerbuild/config.yaml"];

/// プロバイダー設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Docker デーモンのアドレス。未指定なら `$DOCKER_HOST`
    #[serde(default)]
    pub host: Option<String>,
    /// 全リソース共通のレジストリ認証情報
    #[serde(default)]
    pub registries: Vec<Registry>,
}

impl ProviderConfig {
    /// YAML 文字列から読み込む
    pub fn from_yaml(path: &Path, contents: &str) -> Result<Self> {
        let config: ProviderConfig =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config.with_env_host())
    }

    /// ファイルから読み込む
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::ConfigFileNotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading provider config");
        Self::from_yaml(path, &contents)
    }

    /// 設定ファイルを探して読み込む。見つからなければ既定値
    pub fn discover() -> Result<Self> {
        match find_config_file()? {
            Some(path) => Self::load(&path),
            None => Ok(Self::default().with_env_host()),
        }
    }

    /// 接続先ホスト（空文字は未指定扱い）
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }

    fn validate(&self) -> Result<()> {
        for (index, registry) in self.registries.iter().enumerate() {
            if registry.address.is_empty() {
                return Err(ConfigError::MissingRegistryAddress { index });
            }
        }
        Ok(())
    }

    fn with_env_host(mut self) -> Self {
        if self.host().is_none() {
            self.host = std::env::var("DOCKER_HOST").ok().filter(|h| !h.is_empty());
        }
        self
    }
}

/// グローバル設定ディレクトリ (~/.config/dockerbuild)
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("dockerbuild"))
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 DOCKERBUILD_CONFIG (直接パス指定。存在しなければエラー)
/// 2. ./dockerbuild.yaml
/// 3. ./.dockerbuild/config.yaml
/// 4. ~/.config/dockerbuild/config.yaml
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV)
        && !config_path.is_empty()
    {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;
    for candidate in CANDIDATES {
        let path = current_dir.join(candidate);
        if path.is_file() {
            return Ok(Some(path));
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global = config_dir.join("config.yaml");
        if global.is_file() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}
