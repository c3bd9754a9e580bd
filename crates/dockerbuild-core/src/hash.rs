//! ビルドコンテキストのハッシュ計算（変更検出用）

use crate::error::{CoreError, Result};
use crate::ignore::{PatternMatcher, find_patterns};
use crate::path;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// ビルドコンテキストのSHA-256ハッシュを計算する
///
/// Dockerfileの内容、コンテキスト内の各ファイル（内容・相対パス・モード）、
/// ローカルの名前付きコンテキストを順に積算する。`.dockerignore` で
/// 除外されたファイルは含めない。リモートのコンテキストは何も寄与しない。
pub fn hash_build_context(
    context: &str,
    dockerfile: Option<&str>,
    named: &BTreeMap<String, String>,
) -> Result<String> {
    let mut hasher = Sha256::new();
    let dockerfile = dockerfile.filter(|d| !d.is_empty());
    let dockerfile_on_disk = dockerfile.is_some_and(|d| Path::new(d).is_file());
    let context_on_disk = is_local_dir(context);

    let excludes = if context_on_disk || dockerfile_on_disk {
        find_patterns(dockerfile, context)?
    } else {
        Vec::new()
    };
    let matcher = PatternMatcher::new(&excludes)?;

    if let Some(dockerfile) = dockerfile.filter(|_| dockerfile_on_disk) {
        // ファイル名は含めない（Dockerfileの移動は差分にしない）
        let contents = fs::read(dockerfile).map_err(|source| CoreError::Hash {
            path: dockerfile.into(),
            source,
        })?;
        hasher.update(&contents);
    }

    if context_on_disk {
        hash_dir(&mut hasher, context, &matcher)?;
    }

    for location in named.values() {
        if is_local_dir(location) {
            hash_dir(&mut hasher, location, &matcher)?;
        }
    }

    Ok(hex::encode(hasher.finalize()))
}

fn is_local_dir(location: &str) -> bool {
    !location.is_empty() && Path::new(location).is_dir()
}

/// ディレクトリ以下のファイルを辞書順に積算する
fn hash_dir(hasher: &mut Sha256, root: &str, matcher: &PatternMatcher) -> Result<()> {
    let skip_excluded_dirs = !matcher.has_exclusions();
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| CoreError::Hash {
            path: root.into(),
            source: e.into(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let relative = path::clean(&relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if skip_excluded_dirs && matcher.matches(&relative) {
                walker.skip_current_dir();
            }
            continue;
        }
        if matcher.matches(&relative) {
            continue;
        }
        if !(file_type.is_file() || file_type.is_symlink()) {
            // FIFOやソケットなどは読まない
            continue;
        }
        if file_type.is_symlink() && entry.path().is_dir() {
            continue;
        }

        let contents = fs::read(entry.path()).map_err(|source| CoreError::Hash {
            path: entry.path().to_path_buf(),
            source,
        })?;
        let metadata = entry.path().symlink_metadata().map_err(|source| CoreError::Hash {
            path: entry.path().to_path_buf(),
            source,
        })?;

        hasher.update(&contents);
        hasher.update(relative.as_bytes());
        hasher.update(mode_string(&metadata).as_bytes());
    }

    Ok(())
}

/// `-rw-r--r--` 形式のモード文字列
#[cfg(unix)]
fn mode_string(metadata: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    let kind = if metadata.file_type().is_symlink() { 'L' } else { '-' };
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn mode_string(metadata: &fs::Metadata) -> String {
    let kind = if metadata.file_type().is_symlink() { "L" } else { "-" };
    let perms = if metadata.permissions().readonly() {
        "r--r--r--"
    } else {
        "rw-rw-rw-"
    };
    format!("{kind}{perms}")
}
