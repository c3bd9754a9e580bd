use crate::auth::{AuthMap, to_docker_credentials};
use crate::client::{IMAGE_DIGEST_KEY, SolveResponse};
use crate::context::{ContextBuilder, DockerfileSource};
use crate::error::{BuildError, Result};
use bollard::Docker;
use dockerbuild_core::{Build, Context};
use futures_util::stream::StreamExt;
use std::collections::{BTreeMap, HashMap};

/// Docker デーモンのビルドAPIを使うビルダー
pub struct DaemonBuilder {
    docker: Docker,
}

impl DaemonBuilder {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// デーモンのビルドAPIだけで実行できるか
    ///
    /// マルチプラットフォーム、キャッシュ、シークレット、SSH、名前付きコンテキスト、
    /// リモートコンテキスト、docker 以外のエクスポートは buildx が必要。
    pub fn supports(build: &Build) -> bool {
        let opts = &build.opts;
        let exports_ok = match opts.exports.as_slice() {
            [] => true,
            [export] => export.kind == "docker" && export.destination.is_none(),
            _ => false,
        };
        !build.should_exec()
            && exports_ok
            && opts.platforms.len() <= 1
            && opts.cache_from.is_empty()
            && opts.cache_to.is_empty()
            && build.secrets.is_empty()
            && opts.ssh.is_empty()
            && opts.named_contexts.is_empty()
            && Context::new(opts.context_path.clone()).is_local_dir()
    }

    /// イメージをビルドし、イメージIDをダイジェストとして返す
    pub async fn build(&self, build: &Build, auths: &AuthMap) -> Result<SolveResponse> {
        let opts = &build.opts;
        let source = match (&build.inline, &opts.dockerfile) {
            (Some(inline), _) => DockerfileSource::Inline(inline),
            (None, Some(path)) => DockerfileSource::Path(path),
            (None, None) => {
                return Err(BuildError::BuildFailed(
                    "missing 'location' or 'inline'".to_string(),
                ));
            }
        };
        let archive = ContextBuilder::create_context(&opts.context_path, source)?;

        let tag = opts.tags.first().map(String::as_str).unwrap_or("");
        tracing::info!("Building image: {}", if tag.is_empty() { "<untagged>" } else { tag });

        let build_args: HashMap<&str, &str> = opts
            .build_args
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let labels: HashMap<&str, &str> = opts
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let extra_hosts = opts.extra_hosts.join(",");
        let platform = opts.platforms.first().map(|p| p.as_str()).unwrap_or("");

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: archive.dockerfile.as_str(),
            t: tag,
            extrahosts: (!extra_hosts.is_empty()).then_some(extra_hosts.as_str()),
            buildargs: build_args,
            labels,
            networkmode: opts.network.as_str(),
            platform,
            target: opts.target.as_deref().unwrap_or(""),
            nocache: opts.no_cache,
            pull: opts.pull,
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        tracing::debug!("Build options: {:?}", options);

        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(archive.data));
        let credentials = to_docker_credentials(auths);
        let mut stream = self.docker.build_image(
            options,
            (!credentials.is_empty()).then_some(credentials),
            Some(Either::Left(body)),
        );

        let mut image_id = None;
        let mut log = Vec::new();
        while let Some(msg) = stream.next().await {
            let output = msg.map_err(BuildError::DockerConnection)?;
            if let Err(e) = handle_build_output(output, &mut image_id, &mut log) {
                // 失敗時は出力全体を残す
                tracing::info!("{}", log.join(""));
                return Err(e);
            }
        }

        for extra in opts.tags.iter().skip(1) {
            self.tag(tag, extra).await?;
        }

        let image_id = match image_id {
            Some(id) => Some(id),
            None if !tag.is_empty() => self.image_id(tag).await?,
            None => None,
        };

        let mut exporter_response = BTreeMap::new();
        if let Some(id) = image_id {
            tracing::info!("Successfully built: {}", id);
            exporter_response.insert(IMAGE_DIGEST_KEY.to_string(), id);
        }
        Ok(SolveResponse { exporter_response })
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        let (repo, tag) = match target.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => (repo, tag),
            _ => (target, "latest"),
        };
        #[allow(deprecated)]
        let options = bollard::image::TagImageOptions { repo, tag };
        self.docker.tag_image(source, Some(options)).await?;
        Ok(())
    }

    /// イメージID（存在しなければ None）
    pub async fn image_id(&self, reference: &str) -> Result<Option<String>> {
        match self.docker.inspect_image(reference).await {
            Ok(image) => Ok(image.id),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                ..
            }) => Ok(None),
            Err(e) => Err(BuildError::DockerConnection(e)),
        }
    }

    /// ローカルのイメージを削除する（複数タグがあっても削除する）
    pub async fn remove(&self, reference: &str) -> Result<()> {
        let options = bollard::query_parameters::RemoveImageOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_image(reference, Some(options), None)
            .await?;
        Ok(())
    }
}

/// ビルド出力の処理
fn handle_build_output(
    output: bollard::models::BuildInfo,
    image_id: &mut Option<String>,
    log: &mut Vec<String>,
) -> Result<()> {
    if let Some(stream) = output.stream {
        for line in stream.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!("{}", line);
        }
        log.push(stream);
    }

    if let Some(error) = output.error {
        return Err(BuildError::BuildFailed(error));
    }

    if let Some(error_detail) = output.error_detail {
        let error_msg = error_detail
            .message
            .unwrap_or_else(|| "Unknown build error".to_string());
        return Err(BuildError::BuildFailed(error_msg));
    }

    if let Some(status) = output.status {
        tracing::info!("{}", status);
    }

    if let Some(id) = output.aux.and_then(|aux| aux.id) {
        *image_id = Some(id);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockerbuild_core::{BuildOptions, ExportEntry, Platform};

    fn local_build(dir: &std::path::Path) -> Build {
        Build {
            opts: BuildOptions {
                context_path: dir.to_str().unwrap().to_string(),
                dockerfile: Some(dir.join("Dockerfile").to_str().unwrap().to_string()),
                tags: vec!["dockerbuild-test:latest".into()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_supports_simple_local_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut build = local_build(dir.path());
        assert!(DaemonBuilder::supports(&build));

        build.opts.exports.push(ExportEntry {
            kind: "docker".into(),
            ..Default::default()
        });
        assert!(DaemonBuilder::supports(&build));
    }

    #[test]
    fn test_requires_buildx() {
        let dir = tempfile::tempdir().unwrap();

        let mut build = local_build(dir.path());
        build.exec = true;
        assert!(!DaemonBuilder::supports(&build));

        let mut build = local_build(dir.path());
        build.opts.platforms = vec![Platform::LinuxAmd64, Platform::LinuxArm64];
        assert!(!DaemonBuilder::supports(&build));

        let mut build = local_build(dir.path());
        build.secrets.insert("token".into(), "value".into());
        assert!(!DaemonBuilder::supports(&build));

        let mut build = local_build(dir.path());
        build.opts.exports.push(ExportEntry {
            kind: "image".into(),
            attrs: [("push".to_string(), "true".to_string())].into(),
            destination: None,
        });
        assert!(!DaemonBuilder::supports(&build));

        let mut build = local_build(dir.path());
        build.opts.context_path = "https://github.com/me/app.git".into();
        assert!(!DaemonBuilder::supports(&build));
    }

    #[test]
    fn test_handle_build_output() {
        let mut image_id = None;
        let mut log = Vec::new();
        handle_build_output(
            bollard::models::BuildInfo {
                stream: Some("Step 1/2 : FROM alpine\n".into()),
                ..Default::default()
            },
            &mut image_id,
            &mut log,
        )
        .unwrap();
        handle_build_output(
            bollard::models::BuildInfo {
                aux: Some(bollard::models::ImageId {
                    id: Some("sha256:abc".into()),
                }),
                ..Default::default()
            },
            &mut image_id,
            &mut log,
        )
        .unwrap();
        assert_eq!(image_id.as_deref(), Some("sha256:abc"));
        assert_eq!(log.len(), 1);

        let err = handle_build_output(
            bollard::models::BuildInfo {
                error: Some("failed to solve".into()),
                ..Default::default()
            },
            &mut image_id,
            &mut log,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::BuildFailed(_)));
    }

    #[tokio::test]
    #[ignore] // Docker接続が必要なため、通常のテストではスキップ
    async fn test_build_simple_image() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let builder = DaemonBuilder::new(docker);

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM alpine:latest\nCMD echo 'test'").unwrap();

        let response = builder
            .build(&local_build(dir.path()), &AuthMap::new())
            .await
            .unwrap();
        assert!(response.digest().is_some());

        builder.remove("dockerbuild-test:latest").await.ok();
    }
}
