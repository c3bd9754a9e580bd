use serde::{Deserialize, Serialize};

/// 使用するbuildxビルダー
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// ビルダー名（省略時は現在のビルダー）
    #[serde(default)]
    pub name: Option<String>,
}

impl BuilderConfig {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}
