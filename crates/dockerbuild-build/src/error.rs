use dockerbuild_core::{CheckFailures, CoreError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("buildkit is not supported on this host")]
    BuildKitUnsupported,

    #[error("Invalid build configuration: {0}")]
    InvalidConfig(#[from] CheckFailures),

    #[error("Builder {name:?} is unavailable: {message}")]
    Builder { name: String, message: String },

    #[error("Authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("{reference}: not found")]
    NotFound { reference: String },

    #[error("{reference}: unauthorized")]
    Unauthorized { reference: String },

    #[error("Registry request for {reference} failed with status {status}: {message}")]
    Registry {
        reference: String,
        status: u16,
        message: String,
    },

    #[error("`{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("missing build metadata: {0}")]
    MissingMetadata(PathBuf),

    #[error("{}", join_errors(.0))]
    Multiple(Vec<BuildError>),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// レジストリやデーモンが対象を見つけられなかったか
    pub fn is_not_found(&self) -> bool {
        match self {
            BuildError::NotFound { .. } => true,
            BuildError::DockerConnection(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            }) => true,
            _ => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            BuildError::Unauthorized { .. }
                | BuildError::Registry {
                    status: 401 | 403,
                    ..
                }
        )
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::BuildFailed(msg) => {
                format!(
                    "ビルドに失敗しました: {}\n\
                     \n\
                     Dockerfileの内容とビルド出力を確認してください。",
                    msg
                )
            }
            BuildError::BuildKitUnsupported => "このホストでは BuildKit が利用できません。\n\
                 \n\
                 解決方法:\n\
                 1. Docker 23 以降を使用してください\n\
                 2. `docker buildx version` が動作するか確認してください"
                .to_string(),
            BuildError::ContextNotFound(path) => {
                format!(
                    "ビルドコンテキストが見つかりません: {}\n\
                     \n\
                     context.location を確認してください。",
                    path.display()
                )
            }
            BuildError::Builder { name, message } if name.starts_with("cloud-") => format!(
                "ビルダー {name} を利用できません: {message}\n\
                 \n\
                 クラウドビルダーを使う場合は `docker login` を確認してください。"
            ),
            BuildError::Builder { name, message } => format!(
                "ビルダー {name} を利用できません: {message}\n\
                 \n\
                 `docker buildx version` が実行できるか確認してください。"
            ),
            BuildError::InvalidConfig(failures) => {
                format!("入力が不正です:\n{}", failures)
            }
            BuildError::Unauthorized { reference } => {
                format!(
                    "{} へのアクセスが拒否されました。registries の認証情報を確認してください。",
                    reference
                )
            }
            _ => format!("{}", self),
        }
    }
}

fn join_errors(errors: &[BuildError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, BuildError>;
pub type BuildResult<T> = Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found() {
        let err = BuildError::NotFound {
            reference: "docker.io/library/nginx:latest".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_unauthorized());

        let err = BuildError::DockerConnection(bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "No such image".into(),
        });
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unauthorized() {
        let err = BuildError::Registry {
            reference: "ghcr.io/me/app".into(),
            status: 403,
            message: "denied".into(),
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_user_message_for_cloud_builder() {
        let err = BuildError::Builder {
            name: "cloud-me-default".into(),
            message: "no such builder".into(),
        };
        assert!(err.user_message().contains("docker login"));
    }
}
