use crate::encoding::Encode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ビルドに公開するSSHエージェントソケットまたは鍵
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ssh {
    /// `RUN --mount=type=ssh,id=..` で参照するID（通常は `default`）
    pub id: String,
    /// ソケットまたは鍵のパス（省略時は $SSH_AUTH_SOCK）
    #[serde(default)]
    pub paths: Vec<String>,
}

impl Encode for Ssh {
    fn encode(&self) -> String {
        if self.id.is_empty() {
            return String::new();
        }
        let paths: Vec<&str> = self
            .paths
            .iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
            .collect();
        if paths.is_empty() {
            self.id.clone()
        } else {
            format!("{}={}", self.id, paths.join(","))
        }
    }
}

impl fmt::Display for Ssh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
