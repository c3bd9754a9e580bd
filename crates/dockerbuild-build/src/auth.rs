//! レジストリ認証処理
//!
//! ホストの Docker config.json、プロバイダー設定、リソースの順に認証情報を重ね、
//! buildx 用の一時 config.json や Bollard の DockerCredentials に変換します。

use crate::error::{BuildError, Result};
use base64::Engine;
use bollard::auth::DockerCredentials;
use dockerbuild_core::Registry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Docker Hub の認証情報キー
pub const DOCKER_HUB_KEY: &str = "https://index.docker.io/v1/";

const DOCKER_HUB_HOSTS: [&str; 4] = [
    "docker.io",
    "index.docker.io",
    "registry-1.docker.io",
    "registry.hub.docker.com",
];

/// 1つのレジストリの認証情報
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub server_address: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("server_address", &self.server_address)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 認証キー -> 認証情報
pub type AuthMap = BTreeMap<String, AuthConfig>;

/// Docker config.json の構造
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// credential helper 名 (例: "osxkeychain", "desktop")
    #[serde(default)]
    creds_store: Option<String>,
    /// レジストリごとの credential helper
    #[serde(default)]
    cred_helpers: HashMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<String>,
}

/// 一時ディレクトリに書き出す config.json
#[derive(Debug, Serialize)]
struct TemporaryConfig<'a> {
    auths: BTreeMap<&'a str, AuthEntry>,
}

/// credential helper からのレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

/// ホストの Docker 設定ディレクトリ
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    config_dir: PathBuf,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// `$DOCKER_CONFIG`、なければ ~/.docker を使用
    pub fn new() -> Self {
        let config_dir = std::env::var("DOCKER_CONFIG")
            .ok()
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            });

        Self { config_dir }
    }

    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// config.json と credential helper からすべての認証情報を読み込む
    pub fn load_all(&self) -> Result<AuthMap> {
        let path = self.config_path();
        if !path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", path);
            return Ok(AuthMap::new());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| BuildError::AuthFailed {
            registry: path.display().to_string(),
            message: format!("Failed to read config.json: {}", e),
        })?;
        let config: DockerConfig =
            serde_json::from_str(&content).map_err(|e| BuildError::AuthFailed {
                registry: path.display().to_string(),
                message: format!("Failed to parse config.json: {}", e),
            })?;

        let mut auths = AuthMap::new();
        for (server, entry) in &config.auths {
            if let Some(auth_b64) = &entry.auth
                && let Some(creds) = decode_auth(auth_b64, server)?
            {
                auths.insert(server.clone(), creds);
            }
        }

        if let Some(helper) = &config.creds_store {
            for server in list_from_helper(helper) {
                if auths.contains_key(&server) {
                    continue;
                }
                if let Ok(Some(creds)) = get_from_helper(helper, &server) {
                    auths.insert(server, creds);
                }
            }
        }

        for (server, helper) in &config.cred_helpers {
            if let Ok(Some(creds)) = get_from_helper(helper, server) {
                auths.insert(server.clone(), creds);
            }
        }

        tracing::debug!(count = auths.len(), "loaded host credentials");
        Ok(auths)
    }
}

/// `https://ghcr.io/v2/` のような URL からホスト名を取り出す
pub fn convert_to_hostname(address: &str) -> String {
    let stripped = address
        .strip_prefix("http://")
        .or_else(|| address.strip_prefix("https://"))
        .unwrap_or(address);
    stripped
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// レジストリのアドレスから認証キーを求める（Docker Hub は特別扱い）
pub fn credential_key(address: &str) -> String {
    if address == DOCKER_HUB_KEY {
        return DOCKER_HUB_KEY.to_string();
    }
    let hostname = convert_to_hostname(address);
    if DOCKER_HUB_HOSTS.contains(&hostname.as_str()) {
        DOCKER_HUB_KEY.to_string()
    } else {
        hostname
    }
}

/// ホスト、プロバイダー、リソースの順に認証情報を重ねる（後勝ち）
pub fn layer(host: &AuthMap, registries: &[Registry]) -> AuthMap {
    let mut auths = AuthMap::new();
    for (key, auth) in host {
        auths.insert(credential_key(key), auth.clone());
    }
    for registry in registries {
        if registry.address.is_empty() {
            continue;
        }
        auths.insert(
            credential_key(&registry.address),
            AuthConfig {
                server_address: convert_to_hostname(&registry.address),
                username: registry.username().to_string(),
                password: registry.password().to_string(),
            },
        );
    }
    auths
}

/// ドメインの認証情報を探す
pub fn lookup<'a>(auths: &'a AuthMap, domain: &str) -> Option<&'a AuthConfig> {
    auths.get(&credential_key(domain))
}

/// 認証情報だけを持つ config.json を書き出す（credential helper は無効）
pub fn write_docker_config(dir: &Path, auths: &AuthMap) -> Result<PathBuf> {
    let config = TemporaryConfig {
        auths: auths
            .iter()
            .map(|(key, auth)| {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", auth.username, auth.password));
                (
                    key.as_str(),
                    AuthEntry {
                        auth: Some(encoded),
                    },
                )
            })
            .collect(),
    };
    let path = dir.join("config.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&config)?)?;
    Ok(path)
}

/// Bollard のビルドAPIに渡す形へ変換
pub fn to_docker_credentials(auths: &AuthMap) -> HashMap<String, DockerCredentials> {
    auths
        .iter()
        .map(|(key, auth)| {
            (
                key.clone(),
                DockerCredentials {
                    username: Some(auth.username.clone()),
                    password: Some(auth.password.clone()),
                    serveraddress: Some(key.clone()),
                    ..Default::default()
                },
            )
        })
        .collect()
}

/// Base64エンコードされた認証情報をデコード
fn decode_auth(auth_b64: &str, registry: &str) -> Result<Option<AuthConfig>> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth_b64)
        .map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Failed to decode auth: {}", e),
        })?;

    let auth_str = String::from_utf8(decoded).map_err(|e| BuildError::AuthFailed {
        registry: registry.to_string(),
        message: format!("Invalid UTF-8 in auth: {}", e),
    })?;

    Ok(auth_str
        .split_once(':')
        .map(|(username, password)| AuthConfig {
            server_address: registry.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }))
}

/// credential helper が保持しているサーバー一覧
fn list_from_helper(helper: &str) -> Vec<String> {
    let helper_cmd = format!("docker-credential-{}", helper);
    let output = match Command::new(&helper_cmd).arg("list").output() {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            tracing::debug!(
                "Credential helper list failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
            return Vec::new();
        }
        Err(e) => {
            tracing::debug!("Failed to run {}: {}", helper_cmd, e);
            return Vec::new();
        }
    };

    serde_json::from_slice::<HashMap<String, String>>(&output.stdout)
        .map(|servers| servers.into_keys().collect())
        .unwrap_or_default()
}

/// credential helper から認証情報を取得
fn get_from_helper(helper: &str, registry: &str) -> Result<Option<AuthConfig>> {
    let helper_cmd = format!("docker-credential-{}", helper);

    let mut child = Command::new(&helper_cmd)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Failed to run {}: {}", helper_cmd, e),
        })?;

    // レジストリ名を stdin に渡す
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(registry.as_bytes()).ok();
    }

    let output = child
        .wait_with_output()
        .map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Credential helper failed: {}", e),
        })?;

    if !output.status.success() {
        tracing::debug!(
            "Credential helper returned error for {}: {}",
            registry,
            String::from_utf8_lossy(&output.stderr)
        );
        return Ok(None);
    }

    let response: CredentialResponse =
        serde_json::from_slice(&output.stdout).map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Failed to parse credential helper response: {}", e),
        })?;

    Ok(Some(AuthConfig {
        server_address: registry.to_string(),
        username: response.username,
        password: response.secret,
    }))
}
