//! ビルドマニフェスト（`images:` と `indexes:` を持つYAML）

use anyhow::Context as _;
use dockerbuild_core::{ImageArgs, IndexArgs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_MANIFEST: &str = "dockerbuild.build.yaml";

/// ```yaml
/// images:
///   app-amd64:
///     context:
///       location: ./app
///     tags: ["docker.io/me/app:amd64"]
///     platforms: [linux/amd64]
///     push: true
/// indexes:
///   app:
///     tag: docker.io/me/app:latest
///     sources: ["docker.io/me/app:amd64"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub images: BTreeMap<String, ImageArgs>,
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexArgs>,
}

impl Manifest {
    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        // 空ファイルは空のマニフェストとして扱う
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("マニフェストを読み込めません: {}", path.display()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("マニフェストの形式が不正です: {}", path.display()))
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.indexes.is_empty()
    }
}

/// 状態ファイルの名前に使うマニフェスト名（ファイル名から拡張子を除いたもの）
pub fn manifest_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    stem.strip_suffix(".build")
        .map(str::to_string)
        .unwrap_or(stem)
}

/// `--file` が指定されなければカレントディレクトリのデフォルトを使う
pub fn resolve_path(file: Option<PathBuf>) -> PathBuf {
    file.unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST))
}
