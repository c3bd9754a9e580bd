//! `docker buildx` CLI バックエンド
//!
//! ビルドごとに一時的な DOCKER_CONFIG を作り、重ねた認証情報だけを書き出して
//! buildx を起動する。ビルダーの状態を保つため BUILDX_CONFIG はホストを指す。

use crate::auth::{AuthMap, write_docker_config};
use crate::client::SolveResponse;
use crate::error::{BuildError, Result};
use dockerbuild_core::{Build, NetworkMode};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use walkdir::WalkDir;

/// シークレットを渡す環境変数の接頭辞
pub const SECRET_ENV_PREFIX: &str = "DOCKERBUILD_SECRET_";

/// `docker buildx inspect` で分かるビルダーの情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuilderInfo {
    pub name: String,
    pub driver: String,
    pub buildkit_version: Option<String>,
}

impl BuilderInfo {
    /// BuildKit v0.13 以降は複数のエクスポートに対応する
    pub fn supports_multiple_exports(&self) -> bool {
        self.buildkit_version
            .as_deref()
            .and_then(parse_version)
            .is_some_and(|v| v >= (0, 13))
    }
}

fn parse_version(version: &str) -> Option<(u64, u64)> {
    let version = version.trim().trim_start_matches('v');
    let mut parts = version.split(['.', '-', '+']);
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

/// `docker buildx inspect` の出力を解釈する
pub fn parse_inspect(output: &str) -> BuilderInfo {
    let mut info = BuilderInfo::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" if info.name.is_empty() => info.name = value.to_string(),
            "driver" if info.driver.is_empty() => info.driver = value.to_string(),
            "buildkit version" | "buildkit" if info.buildkit_version.is_none() => {
                if !value.is_empty() {
                    info.buildkit_version = Some(value.to_string());
                }
            }
            _ => {}
        }
    }
    info
}

/// シークレットIDに対応する環境変数名
pub fn secret_env_name(id: &str) -> String {
    format!("{}{}", SECRET_ENV_PREFIX, hex::encode(id.as_bytes()).to_uppercase())
}

/// `buildx build` の引数とシークレット用の環境変数を組み立てる
pub fn build_args(build: &Build, builder: &str, metadata: &Path) -> (Vec<String>, Vec<(String, String)>) {
    let opts = &build.opts;
    let mut args: Vec<String> = vec![
        "buildx".into(),
        "build".into(),
        "--progress".into(),
        "plain".into(),
        "--metadata-file".into(),
        metadata.display().to_string(),
        "--builder".into(),
        builder.into(),
    ];
    let mut push = |flag: &str, value: String| {
        args.push(flag.to_string());
        args.push(value);
    };

    for (k, v) in &opts.build_args {
        push("--build-arg", format!("{k}={v}"));
    }
    for c in &opts.cache_from {
        push("--cache-from", c.to_csv());
    }
    for c in &opts.cache_to {
        push("--cache-to", c.to_csv());
    }
    for e in &opts.exports {
        push("--output", e.to_csv());
    }
    for h in &opts.extra_hosts {
        push("--add-host", h.clone());
    }
    for (k, v) in &opts.named_contexts {
        push("--build-context", format!("{k}={v}"));
    }
    for (k, v) in &opts.labels {
        push("--label", format!("{k}={v}"));
    }
    if opts.network != NetworkMode::Default {
        push("--network", opts.network.to_string());
    }
    for p in &opts.platforms {
        push("--platform", p.to_string());
    }
    for s in &opts.ssh {
        push("--ssh", s.to_string());
    }
    for t in &opts.tags {
        push("--tag", t.clone());
    }
    if let Some(target) = &opts.target {
        push("--target", target.clone());
    }
    if build.inline.is_some() {
        push("-f", "-".into());
    } else if let Some(dockerfile) = &opts.dockerfile {
        push("-f", dockerfile.clone());
    }

    let mut env = Vec::new();
    for (id, value) in &build.secrets {
        let name = secret_env_name(id);
        push("--secret", format!("id={id},env={name}"));
        env.push((name, value.clone()));
    }

    if opts.no_cache {
        args.push("--no-cache".into());
    }
    if opts.pull {
        args.push("--pull".into());
    }
    if !opts.context_path.is_empty() {
        args.push(opts.context_path.clone());
    }

    (args, env)
}

/// `--metadata-file` のJSONを文字列マップに平坦化する
pub fn parse_metadata(contents: &[u8]) -> Result<BTreeMap<String, String>> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_slice(contents)?;
    Ok(raw
        .into_iter()
        .filter_map(|(k, v)| match v {
            serde_json::Value::String(s) => Some((k, s)),
            other => serde_json::to_string(&other).ok().map(|s| (k, s)),
        })
        .collect())
}

/// 子プロセスの出力
#[derive(Debug, Default)]
struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

/// docker CLI ラッパー
#[derive(Debug, Clone)]
pub struct Buildx {
    docker_host: Option<String>,
    /// ホストの Docker 設定ディレクトリ
    config_dir: PathBuf,
}

impl Buildx {
    pub fn new(docker_host: Option<String>, config_dir: PathBuf) -> Self {
        Self {
            docker_host,
            config_dir,
        }
    }

    /// buildx でビルドし、メタデータファイルから結果を読む
    pub async fn build(&self, build: &Build, builder: &str, auths: &AuthMap) -> Result<SolveResponse> {
        let (tmp, mut env) = self.prepare_config(auths)?;
        let metadata = tmp.path().join("metadata.json");
        let (args, secrets) = build_args(build, builder, &metadata);
        env.extend(secrets);

        let output = self.run(&args, &env, build.inline.as_deref(), true).await?;
        if !output.success {
            dump_logs(&output);
            return Err(BuildError::BuildFailed(last_line(&output.stderr)));
        }

        let contents = std::fs::read(&metadata).map_err(|_| BuildError::MissingMetadata(metadata.clone()))?;
        Ok(SolveResponse {
            exporter_response: parse_metadata(&contents)?,
        })
    }

    /// `imagetools create` でマニフェストリストを作る（プッシュしない場合は --dry-run）
    pub async fn imagetools_create(
        &self,
        push: bool,
        target: &str,
        refs: &[String],
        auths: &AuthMap,
    ) -> Result<()> {
        let (_tmp, env) = self.prepare_config(auths)?;
        let mut args: Vec<String> = vec![
            "buildx".into(),
            "imagetools".into(),
            "create".into(),
            "--progress=plain".into(),
            "--tag".into(),
            target.into(),
        ];
        if !push {
            args.push("--dry-run".into());
        }
        args.extend(refs.iter().cloned());

        tracing::debug!(?args, "creating manifest");
        self.run_checked(&args, &env, true).await.map(|_| ())
    }

    /// ビルダーの情報を取得する（名前を省略すると現在のビルダー）
    pub async fn inspect(&self, name: Option<&str>) -> Result<BuilderInfo> {
        let mut args = vec!["buildx".to_string(), "inspect".to_string()];
        if let Some(name) = name {
            args.push(name.to_string());
        }
        let stdout = self.run_checked(&args, &[], false).await?;
        Ok(parse_inspect(&stdout))
    }

    /// docker-container ドライバーのビルダーを作成して起動する
    pub async fn create_container_builder(&self) -> Result<String> {
        let args: Vec<String> = ["buildx", "create", "--driver", "docker-container", "--bootstrap"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let stdout = self.run_checked(&args, &[], true).await?;
        Ok(stdout.lines().last().unwrap_or_default().trim().to_string())
    }

    /// 一時的な DOCKER_CONFIG を用意する
    fn prepare_config(&self, auths: &AuthMap) -> Result<(TempDir, Vec<(String, String)>)> {
        let tmp = tempfile::Builder::new().prefix("dockerbuild-").tempdir()?;

        // contexts ディレクトリは存在しないこともある
        if let Err(e) = copy_dir(&self.config_dir.join("contexts"), &tmp.path().join("contexts")) {
            tracing::debug!("skipping docker contexts: {}", e);
        }
        write_docker_config(tmp.path(), auths)?;

        let buildx_config = std::env::var("BUILDX_CONFIG")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.config_dir.join("buildx").display().to_string());
        let env = vec![
            ("DOCKER_CONFIG".to_string(), tmp.path().display().to_string()),
            ("BUILDX_CONFIG".to_string(), buildx_config),
        ];
        Ok((tmp, env))
    }

    async fn run_checked(&self, args: &[String], env: &[(String, String)], stream: bool) -> Result<String> {
        let output = self.run(args, env, None, stream).await?;
        if !output.success {
            dump_logs(&output);
            return Err(BuildError::CommandFailed {
                command: format!("docker {}", args.join(" ")),
                message: last_line(&output.stderr),
            });
        }
        Ok(output.stdout)
    }

    async fn run(
        &self,
        args: &[String],
        env: &[(String, String)],
        stdin: Option<&str>,
        stream: bool,
    ) -> Result<CommandOutput> {
        let mut cmd = Command::new("docker");
        cmd.args(args);
        cmd.envs(env.iter().map(|(k, v)| (k, v)));
        if let Some(host) = &self.docker_host {
            cmd.env("DOCKER_HOST", host);
        }
        cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Running: docker {}", args.join(" "));

        let mut child = cmd.spawn().map_err(|e| BuildError::CommandFailed {
            command: format!("docker {}", args.join(" ")),
            message: e.to_string(),
        })?;

        let input = child.stdin.take();
        let write_stdin = async move {
            if let (Some(mut pipe), Some(contents)) = (input, stdin) {
                pipe.write_all(contents.as_bytes()).await?;
                pipe.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (written, stdout, stderr) = tokio::join!(
            write_stdin,
            forward(child.stdout.take(), stream),
            forward(child.stderr.take(), stream),
        );
        written?;
        let status = child.wait().await?;

        Ok(CommandOutput {
            success: status.success(),
            stdout,
            stderr,
        })
    }
}

/// 出力を1行ずつログに流しつつ全体を保持する
async fn forward<R: AsyncRead + Unpin>(reader: Option<R>, stream: bool) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    let mut collected = String::new();
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if stream {
            tracing::info!("{}", line);
        } else {
            tracing::debug!("{}", line);
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

/// 失敗時に出力全体を残す
fn dump_logs(output: &CommandOutput) {
    if !output.stdout.is_empty() {
        tracing::info!("{}", output.stdout);
    }
    if !output.stderr.is_empty() {
        tracing::error!("{}", output.stderr);
    }
}

fn last_line(output: &str) -> String {
    output
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("exited with an error")
        .trim()
        .to_string()
}

fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockerbuild_core::{BuildOptions, CacheEntry, ExportEntry, Platform, Ssh};

    fn sample_build() -> Build {
        let mut opts = BuildOptions {
            context_path: "app".into(),
            dockerfile: Some("app/Dockerfile".into()),
            tags: vec!["docker.io/me/app:v1".into()],
            platforms: vec![Platform::LinuxAmd64, Platform::LinuxArm64],
            no_cache: true,
            target: Some("release".into()),
            ..Default::default()
        };
        opts.build_args.insert("VERSION".into(), "1.0".into());
        opts.cache_from.push(CacheEntry {
            kind: "registry".into(),
            attrs: [("ref".to_string(), "docker.io/me/app:cache".to_string())].into(),
        });
        opts.exports.push(ExportEntry {
            kind: "image".into(),
            attrs: [("push".to_string(), "true".to_string())].into(),
            destination: None,
        });
        opts.ssh.push(Ssh {
            id: "default".into(),
            paths: vec![],
        });

        Build {
            opts,
            secrets: [("npmrc".to_string(), "token".to_string())].into(),
            inline: None,
            exec: true,
        }
    }

    #[test]
    fn test_build_args() {
        let (args, env) = build_args(&sample_build(), "mybuilder", Path::new("/tmp/m.json"));
        let joined = args.join(" ");

        assert!(joined.starts_with(
            "buildx build --progress plain --metadata-file /tmp/m.json --builder mybuilder"
        ));
        assert!(joined.contains("--build-arg VERSION=1.0"));
        assert!(joined.contains("--cache-from type=registry,ref=docker.io/me/app:cache"));
        assert!(joined.contains("--output type=image,push=true"));
        assert!(joined.contains("--platform linux/amd64 --platform linux/arm64"));
        assert!(joined.contains("--ssh default"));
        assert!(joined.contains("--tag docker.io/me/app:v1"));
        assert!(joined.contains("--target release"));
        assert!(joined.contains("-f app/Dockerfile"));
        assert!(joined.contains("--no-cache"));
        assert!(!joined.contains("--network"));
        assert_eq!(args.last().map(String::as_str), Some("app"));

        let secret = secret_env_name("npmrc");
        assert!(joined.contains(&format!("--secret id=npmrc,env={secret}")));
        assert_eq!(env, vec![(secret, "token".to_string())]);
        assert!(!joined.contains("token "));
    }

    #[test]
    fn test_inline_dockerfile_reads_stdin() {
        let mut build = sample_build();
        build.inline = Some("FROM alpine".into());
        let (args, _) = build_args(&build, "default", Path::new("m.json"));
        let joined = args.join(" ");
        assert!(joined.contains("-f -"));
        assert!(!joined.contains("-f app/Dockerfile"));
    }

    #[test]
    fn test_secret_env_name() {
        let name = secret_env_name("my-secret");
        assert!(name.starts_with(SECRET_ENV_PREFIX));
        assert!(
            name.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        );
        assert_ne!(name, secret_env_name("my_secret"));
    }

    #[test]
    fn test_parse_metadata() {
        let contents = br#"{
            "containerimage.digest": "sha256:abc",
            "containerimage.descriptor": {"mediaType": "x", "size": 1},
            "buildx.build.ref": "builder/builder0/xyz"
        }"#;
        let metadata = parse_metadata(contents).unwrap();
        assert_eq!(metadata["containerimage.digest"], "sha256:abc");
        assert_eq!(
            metadata["containerimage.descriptor"],
            r#"{"mediaType":"x","size":1}"#
        );
    }

    #[test]
    fn test_parse_inspect() {
        let output = "Name:          mybuilder\n\
                      Driver:        docker-container\n\
                      Last Activity: 2024-05-01 10:00:00 +0000 UTC\n\
                      \n\
                      Nodes:\n\
                      Name:             mybuilder0\n\
                      Endpoint:         unix:///var/run/docker.sock\n\
                      Status:           running\n\
                      BuildKit version: v0.13.2\n\
                      Platforms:        linux/amd64\n";
        let info = parse_inspect(output);
        assert_eq!(info.name, "mybuilder");
        assert_eq!(info.driver, "docker-container");
        assert_eq!(info.buildkit_version.as_deref(), Some("v0.13.2"));
        assert!(info.supports_multiple_exports());
    }

    #[test]
    fn test_old_buildkit() {
        let info = parse_inspect("Name: default\nDriver: docker\nBuildkit: v0.12.5\n");
        assert_eq!(info.buildkit_version.as_deref(), Some("v0.12.5"));
        assert!(!info.supports_multiple_exports());

        let info = parse_inspect("Name: default\nDriver: docker\n");
        assert!(!info.supports_multiple_exports());
    }

    #[test]
    fn test_copy_dir() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir(src.path().join("meta")).unwrap();
        std::fs::write(src.path().join("meta/ctx.json"), "{}").unwrap();
        let dst = tempfile::tempdir().unwrap();

        copy_dir(src.path(), &dst.path().join("contexts")).unwrap();
        assert!(dst.path().join("contexts/meta/ctx.json").exists());
    }
}
