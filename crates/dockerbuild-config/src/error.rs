use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error("設定ファイルが見つかりません: {0}")]
    ConfigFileNotFound(PathBuf),

    #[error("設定ファイルの解析に失敗しました ({path}): {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("registries[{index}]: address が指定されていません")]
    MissingRegistryAddress { index: usize },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// CLI に表示するための短いメッセージ
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigFileNotFound(path) => format!(
                "設定ファイル {} が見つかりません。DOCKERBUILD_CONFIG を確認してください",
                path.display()
            ),
            ConfigError::Parse { path, source } => {
                format!("{} の YAML が不正です: {}", path.display(), source)
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
