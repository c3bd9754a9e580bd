use serde::{Deserialize, Serialize};

/// Dockerfileの指定（`location` と `inline` はどちらか一方）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dockerfile {
    /// Dockerfileのパス（ローカルまたはリモート）
    #[serde(default)]
    pub location: Option<String>,
    /// Dockerfileの内容
    #[serde(default)]
    pub inline: Option<String>,
}

impl Dockerfile {
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            inline: None,
        }
    }

    pub fn inline(contents: impl Into<String>) -> Self {
        Self {
            location: None,
            inline: Some(contents.into()),
        }
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref().filter(|l| !l.is_empty())
    }

    pub fn inline_contents(&self) -> Option<&str> {
        self.inline.as_deref().filter(|i| !i.is_empty())
    }
}
