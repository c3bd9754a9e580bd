use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("無効なイメージ参照です: {reference}\n理由: {message}")]
    InvalidReference { reference: String, message: String },

    #[error("Dockerfileの構文エラー (行 {line}): {message}")]
    DockerfileSyntax { line: usize, message: String },

    #[error("無効なエントリです: {input}\n理由: {message}")]
    InvalidEntry { input: String, message: String },

    #[error("ビルドコンテキストのハッシュ計算に失敗しました: {path}\n理由: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn invalid_reference(reference: &str, message: impl Into<String>) -> Self {
        CoreError::InvalidReference {
            reference: reference.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_entry(input: &str, message: impl Into<String>) -> Self {
        CoreError::InvalidEntry {
            input: input.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        CoreError::DockerfileSyntax {
            line,
            message: message.into(),
        }
    }

    /// エラーの短い説明（プロパティ検証の理由として使う）
    pub fn reason(&self) -> String {
        match self {
            CoreError::InvalidReference { message, .. } => message.clone(),
            CoreError::InvalidEntry { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// プロパティパス付きの入力検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFailure {
    pub property: String,
    pub reason: String,
}

impl CheckFailure {
    pub fn new(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.property, self.reason)
    }
}

/// 検証で見つかったすべてのエラー
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckFailures(pub Vec<CheckFailure>);

impl CheckFailures {
    pub fn push(&mut self, property: impl Into<String>, reason: impl Into<String>) {
        self.0.push(CheckFailure::new(property, reason));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckFailure> {
        self.0.iter()
    }

    /// 指定したプロパティのエラーがあるか
    pub fn has(&self, property: &str) -> bool {
        self.0.iter().any(|f| f.property == property)
    }

    pub fn into_result<T>(self, value: T) -> std::result::Result<T, CheckFailures> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl fmt::Display for CheckFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl IntoIterator for CheckFailures {
    type Item = CheckFailure;
    type IntoIter = std::vec::IntoIter<CheckFailure>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
