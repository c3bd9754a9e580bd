pub mod check;
pub mod diff;
pub mod down;
pub mod hash;
pub mod refresh;
pub mod up;

use crate::manifest::{self, Manifest};
use crate::state::StateStore;
use colored::Colorize;
use dockerbuild_build::Host;
use dockerbuild_config::ProviderConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 読み込んだマニフェストと対応する状態ファイル
pub struct Workspace {
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
    pub store: StateStore,
}

impl Workspace {
    pub fn load(file: Option<PathBuf>, state_dir: &Path) -> anyhow::Result<Self> {
        let manifest_path = manifest::resolve_path(file);
        let manifest = Manifest::load(&manifest_path)?;
        if manifest.is_empty() {
            tracing::warn!(manifest = %manifest_path.display(), "manifest declares no resources");
        }
        let store = StateStore::new(state_dir, &manifest::manifest_name(&manifest_path));
        tracing::debug!(
            manifest = %manifest_path.display(),
            state = %store.path().display(),
            "workspace loaded"
        );
        Ok(Self {
            manifest_path,
            manifest,
            store,
        })
    }

    pub fn print_header(&self, message: &str) {
        println!("{}", message.blue());
        println!("📄 {}", self.manifest_path.display().to_string().cyan());
        println!();
    }
}

/// プロバイダー設定を探してDockerホストを準備する
pub fn connect() -> anyhow::Result<Arc<Host>> {
    let config =
        ProviderConfig::discover().map_err(|e| anyhow::anyhow!(e.user_message()))?;
    if let Some(host) = config.host() {
        println!("🐳 Docker host: {}", host.cyan());
    }
    let host = Host::new(config).map_err(|e| anyhow::anyhow!(e.user_message()))?;
    Ok(Arc::new(host))
}
