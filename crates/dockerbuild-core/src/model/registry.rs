use serde::{Deserialize, Serialize};
use std::fmt;

/// レジストリの認証情報
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// レジストリのホスト（例: `docker.io`, `ghcr.io`）
    pub address: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Registry {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or_default()
    }

    /// アドレスとユーザー名だけを比較する（パスワードの変更は差分にしない）
    pub fn same_identity(&self, other: &Registry) -> bool {
        self.address == other.address && self.username() == other.username()
    }
}

// パスワードをログに出さない
impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}
