//! Imageリソース
//!
//! ビルドはべき等ではないため、create と update は同じ処理になる。
//! read はレジストリに残っているタグだけを状態に残す。

use super::ReadResponse;
use crate::client::Client;
use crate::error::{BuildError, Result};
use dockerbuild_core::{
    CheckFailures, DiffResponse, ImageArgs, ImageState, Reference, add_digest, hash_build_context,
};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub struct Image<'a> {
    client: &'a dyn Client,
}

impl<'a> Image<'a> {
    pub fn new(client: &'a dyn Client) -> Self {
        Self { client }
    }

    /// 入力を検証してデフォルト値を埋める
    pub fn check(args: ImageArgs, preview: bool) -> std::result::Result<ImageArgs, CheckFailures> {
        args.check(preview)
    }

    /// イメージをビルドし、`(id, state)` を返す
    ///
    /// ダイジェストが得られればそれがIDになる。得られなければリソース名を使う。
    pub async fn create(
        &self,
        name: &str,
        args: &ImageArgs,
        preview: bool,
    ) -> Result<(String, ImageState)> {
        let mut state = ImageState::new(args.clone());
        let mut id = name.to_string();

        // タグが不正なら空のまま
        if let Some(tag) = args
            .tags
            .iter()
            .find(|tag| Reference::normalize(tag).is_ok())
        {
            state.reference = tag.clone();
        }

        if !self.client.buildkit_enabled().await? {
            return Err(BuildError::BuildKitUnsupported);
        }

        let build = args.to_build(preview)?;

        state.context_hash = hash_build_context(
            args.context_location(),
            args.dockerfile_location(),
            &args.named_contexts(),
        )?;

        if preview && !args.should_build_on_preview() {
            return Ok((id, state));
        }
        if preview && !args.buildable() {
            warn!("Skipping preview build because some inputs are unknown.");
            return Ok((id, state));
        }

        let result = self.client.build(&build).await?;

        let Some(digest) = result.digest().map(str::to_string) else {
            debug!(name, "build finished without an image digest");
            return Ok((id, state));
        };
        info!(name, %digest, "image built");

        state.digest = digest.clone();
        id = digest.clone();

        if let Some(reference) = args.tags.iter().find_map(|tag| add_digest(tag, &digest)) {
            state.reference = reference;
        }

        Ok((id, state))
    }

    /// ビルドし直す（create と同じ）
    pub async fn update(
        &self,
        name: &str,
        args: &ImageArgs,
        preview: bool,
    ) -> Result<(String, ImageState)> {
        self.create(name, args, preview).await
    }

    /// レジストリ上にまだ存在するタグを確認する
    ///
    /// すべてのタグが消えていれば `id` は空になる。
    pub async fn read(
        &self,
        id: &str,
        args: ImageArgs,
        mut state: ImageState,
    ) -> Result<ReadResponse<ImageArgs, ImageState>> {
        if !state.args.is_exported() {
            return Ok(ReadResponse {
                id: id.to_string(),
                inputs: args,
                state,
            });
        }

        let mut tags = Vec::new();
        for tag in &state.args.tags {
            let Some(reference) = add_digest(tag, &state.digest) else {
                // 完全修飾でないタグは確認できないので残す
                tags.push(tag.clone());
                continue;
            };

            let descriptors = match self.client.inspect(&reference).await {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    warn!(%reference, "{e}");
                    continue;
                }
            };

            if descriptors.iter().any(|d| !d.is_attestation()) {
                tags.push(tag.clone());
            }
        }

        let id = if !args.tags.is_empty() && tags.is_empty() {
            String::new()
        } else {
            id.to_string()
        };
        state.args.tags = tags;

        Ok(ReadResponse {
            id,
            inputs: args,
            state,
        })
    }

    /// タグ付けしたイメージをすべて削除する
    ///
    /// 同じリポジトリのタグは同じダイジェストを指すので一度だけ削除する。
    pub async fn delete(&self, state: &ImageState) -> Result<()> {
        if state.digest.is_empty() {
            if state.reference.is_empty() {
                return Ok(());
            }
            return match self.client.delete(&state.reference).await {
                Err(e) if e.is_not_found() => {
                    warn!("{} not found", state.reference);
                    Ok(())
                }
                other => other,
            };
        }

        let references: BTreeSet<String> = state
            .args
            .tags
            .iter()
            .filter_map(|tag| Reference::parse_normalized(tag).ok())
            .map(|r| r.with_digest(state.digest.clone()).common_name())
            .collect();

        let mut errors = Vec::new();
        for reference in references {
            match self.client.delete(&reference).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => warn!("{reference} not found"),
                Err(e) => errors.push(e),
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(BuildError::Multiple(errors)),
        }
    }

    pub fn diff(olds: &ImageState, news: &ImageArgs) -> Result<DiffResponse> {
        Ok(olds.diff(news)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::fake::{DIGEST, FakeClient, descriptor};
    use dockerbuild_core::BuildContext;
    use std::fs;
    use tempfile::TempDir;

    const TAG: &str = "docker.io/dockerbuildbot/buildkit-e2e:example";

    fn project() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM alpine\n").unwrap();
        dir
    }

    fn image_args(dir: &TempDir) -> ImageArgs {
        ImageArgs {
            context: Some(BuildContext::new(dir.path().to_string_lossy())),
            tags: vec![TAG.to_string()],
            push: true,
            ..Default::default()
        }
        .check(false)
        .unwrap()
    }

    fn pushed_state(tags: &[&str]) -> ImageState {
        let mut state = ImageState::new(ImageArgs {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            push: true,
            ..Default::default()
        });
        state.digest = DIGEST.to_string();
        state
    }

    #[tokio::test]
    async fn test_create_records_digest() {
        let dir = project();
        let client = FakeClient::new();
        let image = Image::new(&client);

        let (id, state) = image.create("example", &image_args(&dir), false).await.unwrap();

        assert_eq!(id, DIGEST);
        assert_eq!(state.digest, DIGEST);
        assert_eq!(state.reference, format!("{TAG}@{DIGEST}"));
        assert!(!state.context_hash.is_empty());
        assert_eq!(client.calls(), vec![format!("build {TAG}")]);
    }

    #[tokio::test]
    async fn test_create_without_digest_keeps_name() {
        let dir = project();
        let mut client = FakeClient::new();
        client.digest = None;
        let image = Image::new(&client);

        let (id, state) = image.create("example", &image_args(&dir), false).await.unwrap();

        assert_eq!(id, "example");
        assert_eq!(state.digest, "");
        assert_eq!(state.reference, TAG);
    }

    #[tokio::test]
    async fn test_create_requires_buildkit() {
        let dir = project();
        let mut client = FakeClient::new();
        client.buildkit = false;
        let image = Image::new(&client);

        let err = image
            .create("example", &image_args(&dir), false)
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::BuildKitUnsupported));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_preview_respects_build_on_preview() {
        let dir = project();
        let client = FakeClient::new();
        let image = Image::new(&client);

        let mut args = image_args(&dir);
        args.build_on_preview = Some(false);
        let (id, state) = image.create("example", &args, true).await.unwrap();

        assert_eq!(id, "example");
        assert!(state.digest.is_empty());
        assert!(!state.context_hash.is_empty());
        assert!(client.calls().is_empty());

        args.build_on_preview = Some(true);
        image.create("example", &args, true).await.unwrap();
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_read_drops_missing_tags() {
        let other = "docker.io/dockerbuildbot/buildkit-e2e:gone";
        let mut client = FakeClient::new();
        client
            .manifests
            .insert(format!("{TAG}@{DIGEST}"), vec![descriptor("amd64")]);
        let image = Image::new(&client);

        let state = pushed_state(&[TAG, other, "unqualified:tag"]);
        let response = image
            .read(DIGEST, state.args.clone(), state)
            .await
            .unwrap();

        assert!(response.exists());
        assert_eq!(
            response.state.args.tags,
            vec![TAG.to_string(), "unqualified:tag".to_string()]
        );
        // 入力はそのまま返す
        assert_eq!(response.inputs.tags.len(), 3);
    }

    #[tokio::test]
    async fn test_read_ignores_attestations() {
        let mut client = FakeClient::new();
        client
            .manifests
            .insert(format!("{TAG}@{DIGEST}"), vec![descriptor("unknown")]);
        let image = Image::new(&client);

        let state = pushed_state(&[TAG]);
        let response = image
            .read(DIGEST, state.args.clone(), state)
            .await
            .unwrap();

        assert!(!response.exists());
        assert!(response.state.args.tags.is_empty());
    }

    #[tokio::test]
    async fn test_read_skips_unexported_images() {
        let client = FakeClient::new();
        let image = Image::new(&client);

        let mut state = pushed_state(&[TAG]);
        state.args.push = false;
        let response = image
            .read(DIGEST, state.args.clone(), state.clone())
            .await
            .unwrap();

        assert_eq!(response.id, DIGEST);
        assert_eq!(response.state, state);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_dedups_repositories() {
        let mut client = FakeClient::new();
        let missing = format!("docker.io/dockerbuildbot/other@{DIGEST}");
        client.missing.insert(missing.clone());
        let image = Image::new(&client);

        let state = pushed_state(&[
            TAG,
            "docker.io/dockerbuildbot/buildkit-e2e:latest",
            "dockerbuildbot/other:v1",
        ]);
        image.delete(&state).await.unwrap();

        assert_eq!(
            client.calls(),
            vec![
                format!("delete docker.io/dockerbuildbot/buildkit-e2e@{DIGEST}"),
                format!("delete {missing}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_without_digest_uses_reference() {
        let client = FakeClient::new();
        let image = Image::new(&client);

        let mut state = ImageState::new(ImageArgs::default());
        image.delete(&state).await.unwrap();
        assert!(client.calls().is_empty());

        state.reference = TAG.to_string();
        image.delete(&state).await.unwrap();
        assert_eq!(client.calls(), vec![format!("delete {TAG}")]);
    }

    #[test]
    fn test_diff_reports_changed_tags() {
        let state = pushed_state(&[TAG]);
        let mut news = state.args.clone();
        news.tags.push("docker.io/dockerbuildbot/buildkit-e2e:next".into());

        let diff = Image::diff(&state, &news).unwrap();
        assert!(diff.detailed.contains_key("tags"));
    }
}
