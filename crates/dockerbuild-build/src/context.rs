//! デーモンビルド用のコンテキストアーカイブ

use crate::error::{BuildError, Result};
use dockerbuild_core::ignore::{PatternMatcher, find_patterns};
use dockerbuild_core::path;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::path::Path;
use tar::Builder;
use walkdir::WalkDir;

/// アーカイブ内に置くDockerfileの名前
pub const DOCKERFILE_ENTRY: &str = ".dockerbuild.Dockerfile";

/// Dockerfileの取得元
#[derive(Debug, Clone, Copy)]
pub enum DockerfileSource<'a> {
    Path(&'a str),
    Inline(&'a str),
}

/// tar.gz化したコンテキスト
#[derive(Debug)]
pub struct ContextArchive {
    pub data: Vec<u8>,
    /// アーカイブ内のDockerfileのパス
    pub dockerfile: String,
}

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// `.dockerignore` に一致するファイルは含めない。Dockerfileは常に
    /// [`DOCKERFILE_ENTRY`] として追加する。
    pub fn create_context(context_path: &str, dockerfile: DockerfileSource) -> Result<ContextArchive> {
        let root = Path::new(context_path);
        if !root.is_dir() {
            return Err(BuildError::ContextNotFound(root.to_path_buf()));
        }
        tracing::debug!("Creating build context from: {}", root.display());

        let dockerfile_location = match dockerfile {
            DockerfileSource::Path(p) => Some(p),
            DockerfileSource::Inline(_) => None,
        };
        let patterns = find_patterns(dockerfile_location, context_path)?;
        let matcher = PatternMatcher::new(&patterns)?;

        let dockerfile_content = match dockerfile {
            DockerfileSource::Path(p) => std::fs::read(p)?,
            DockerfileSource::Inline(contents) => contents.as_bytes().to_vec(),
        };

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);
            tar.follow_symlinks(false);

            append_tree(&mut tar, root, &matcher)?;

            let mut header = tar::Header::new_gnu();
            header.set_path(DOCKERFILE_ENTRY)?;
            header.set_size(dockerfile_content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, &dockerfile_content[..])?;

            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());
        Self::check_context_size(archive_data.len());

        Ok(ContextArchive {
            data: archive_data,
            dockerfile: DOCKERFILE_ENTRY.to_string(),
        })
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "ビルドコンテキストが大きすぎます（{}MB）。.dockerignore で不要なファイルを除外してください",
                size / 1024 / 1024
            );
        }
    }
}

fn append_tree<W: std::io::Write>(
    tar: &mut Builder<W>,
    root: &Path,
    matcher: &PatternMatcher,
) -> Result<()> {
    let skip_excluded_dirs = !matcher.has_exclusions();
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| BuildError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let relative = path::clean(&relative);
        let file_type = entry.file_type();

        if matcher.matches(&relative) {
            if file_type.is_dir() && skip_excluded_dirs {
                walker.skip_current_dir();
            }
            continue;
        }

        if file_type.is_dir() {
            tar.append_dir(&relative, entry.path())?;
        } else if file_type.is_file() || file_type.is_symlink() {
            tar.append_path_with_name(entry.path(), &relative)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::tempdir;

    fn entries(archive: &ContextArchive) -> BTreeSet<String> {
        let decoder = flate2::read::GzDecoder::new(&archive.data[..]);
        let mut tar = tar::Archive::new(decoder);
        tar.entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_create_context() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("file1.txt"), "content1").unwrap();
        let subdir = temp_dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("file2.txt"), "content2").unwrap();
        let dockerfile = temp_dir.path().join("Dockerfile");
        fs::write(&dockerfile, "FROM alpine\nRUN echo test").unwrap();

        let context = temp_dir.path().to_str().unwrap();
        let archive = ContextBuilder::create_context(
            context,
            DockerfileSource::Path(dockerfile.to_str().unwrap()),
        )
        .unwrap();

        let names = entries(&archive);
        assert!(names.contains("file1.txt"));
        assert!(names.contains("subdir/file2.txt"));
        assert!(names.contains(DOCKERFILE_ENTRY));
        assert_eq!(archive.dockerfile, DOCKERFILE_ENTRY);
    }

    #[test]
    fn test_create_context_honours_dockerignore() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join(".dockerignore"), "*.log\nnode_modules\n").unwrap();
        fs::write(temp_dir.path().join("app.js"), "x").unwrap();
        fs::write(temp_dir.path().join("debug.log"), "x").unwrap();
        fs::create_dir(temp_dir.path().join("node_modules")).unwrap();
        fs::write(temp_dir.path().join("node_modules/dep.js"), "x").unwrap();

        let archive = ContextBuilder::create_context(
            temp_dir.path().to_str().unwrap(),
            DockerfileSource::Inline("FROM scratch"),
        )
        .unwrap();

        let names = entries(&archive);
        assert!(names.contains("app.js"));
        assert!(!names.contains("debug.log"));
        assert!(!names.iter().any(|n| n.starts_with("node_modules")));
    }

    #[test]
    fn test_inline_dockerfile_contents() {
        let temp_dir = tempdir().unwrap();
        let archive = ContextBuilder::create_context(
            temp_dir.path().to_str().unwrap(),
            DockerfileSource::Inline("FROM alpine\n"),
        )
        .unwrap();

        let decoder = flate2::read::GzDecoder::new(&archive.data[..]);
        let mut tar = tar::Archive::new(decoder);
        let mut found = false;
        for entry in tar.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap().to_string_lossy() == DOCKERFILE_ENTRY {
                let mut contents = String::new();
                std::io::Read::read_to_string(&mut entry, &mut contents).unwrap();
                assert_eq!(contents, "FROM alpine\n");
                found = true;
            }
        }
        assert!(found);
    }

    #[test]
    fn test_missing_context() {
        let err = ContextBuilder::create_context(
            "/nonexistent/context",
            DockerfileSource::Inline("FROM alpine"),
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::ContextNotFound(_)));
    }
}
