//! Indexリソース
//!
//! 既存のイメージをまとめたマニフェストリストを `buildx imagetools create` で作る。

use super::ReadResponse;
use crate::client::Client;
use crate::error::Result;
use dockerbuild_core::{CheckFailures, DiffResponse, IndexArgs, IndexState, add_digest};
use tracing::{info, warn};

pub struct Index<'a> {
    client: &'a dyn Client,
}

impl<'a> Index<'a> {
    pub fn new(client: &'a dyn Client) -> Self {
        Self { client }
    }

    pub fn check(args: IndexArgs) -> std::result::Result<IndexArgs, CheckFailures> {
        args.check()
    }

    pub async fn create(
        &self,
        name: &str,
        args: &IndexArgs,
        preview: bool,
    ) -> Result<(String, IndexState)> {
        let state = self
            .update(name, IndexState::default(), args, preview)
            .await?;
        Ok((name.to_string(), state))
    }

    /// マニフェストリストを作り直す
    ///
    /// プレビュー中は何もしない。プッシュしない場合は `--dry-run` で検証だけ行う。
    pub async fn update(
        &self,
        name: &str,
        mut state: IndexState,
        args: &IndexArgs,
        preview: bool,
    ) -> Result<IndexState> {
        state.args = args.clone();
        state.reference = args.tag.clone();

        if preview {
            return Ok(state);
        }

        self.client
            .manifest_create(args.is_pushed(), &args.tag, &args.sources)
            .await?;
        info!(name, tag = %args.tag, "index created");

        let response = self.read(name, args.clone(), state).await?;
        Ok(response.state)
    }

    /// レジストリ上のダイジェストで参照を更新する
    pub async fn read(
        &self,
        id: &str,
        args: IndexArgs,
        mut state: IndexState,
    ) -> Result<ReadResponse<IndexArgs, IndexState>> {
        state.args = args.clone();
        state.reference = args.tag.clone();

        if !args.is_pushed() {
            return Ok(ReadResponse {
                id: id.to_string(),
                inputs: args,
                state,
            });
        }

        let mut id = id.to_string();
        match self.client.manifest_inspect(&args.tag).await {
            Ok(digest) => {
                if let Some(reference) = add_digest(&args.tag, &digest) {
                    state.reference = reference;
                }
            }
            Err(e) if e.is_not_found() => id.clear(),
            Err(e) if e.is_unauthorized() => {
                warn!(tag = %args.tag, "invalid credentials, skipping");
            }
            Err(e) => return Err(e),
        }

        Ok(ReadResponse {
            id,
            inputs: args,
            state,
        })
    }

    pub async fn delete(&self, state: &IndexState) -> Result<()> {
        if !state.args.is_pushed() {
            return Ok(());
        }
        match self.client.manifest_delete(&state.reference).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    pub fn diff(olds: &IndexState, news: &IndexArgs) -> DiffResponse {
        olds.diff(news)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::fake::{DIGEST, FakeClient};

    const TAG: &str = "docker.io/dockerbuildbot/buildkit-e2e:manifest";

    fn index_args() -> IndexArgs {
        IndexArgs {
            tag: TAG.into(),
            sources: vec![
                "docker.io/dockerbuildbot/buildkit-e2e:amd64".into(),
                "docker.io/dockerbuildbot/buildkit-e2e:arm64".into(),
            ],
            ..Default::default()
        }
        .check()
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_pushes_and_reads() {
        let mut client = FakeClient::new();
        client.tags.insert(TAG.into(), DIGEST.into());
        let index = Index::new(&client);

        let (id, state) = index.create("index", &index_args(), false).await.unwrap();

        assert_eq!(id, "index");
        assert_eq!(state.reference, format!("{TAG}@{DIGEST}"));
        assert_eq!(
            client.calls(),
            vec![
                format!(
                    "manifest_create {TAG} push=true docker.io/dockerbuildbot/buildkit-e2e:amd64,docker.io/dockerbuildbot/buildkit-e2e:arm64"
                ),
                format!("manifest_inspect {TAG}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_without_push_is_dry_run() {
        let client = FakeClient::new();
        let index = Index::new(&client);

        let mut args = index_args();
        args.push = Some(false);
        let (_, state) = index.create("index", &args, false).await.unwrap();

        assert_eq!(state.reference, TAG);
        assert_eq!(client.calls().len(), 1);
        assert!(client.calls()[0].contains("push=false"));
    }

    #[tokio::test]
    async fn test_preview_does_nothing() {
        let client = FakeClient::new();
        let index = Index::new(&client);

        let (_, state) = index.create("index", &index_args(), true).await.unwrap();

        assert_eq!(state.reference, TAG);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_missing_index() {
        let client = FakeClient::new();
        let index = Index::new(&client);

        let response = index
            .read("index", index_args(), IndexState::default())
            .await
            .unwrap();
        assert!(!response.exists());
    }

    #[tokio::test]
    async fn test_read_unauthorized_keeps_state() {
        let mut client = FakeClient::new();
        client.unauthorized = true;
        let index = Index::new(&client);

        let response = index
            .read("index", index_args(), IndexState::default())
            .await
            .unwrap();
        assert_eq!(response.id, "index");
        assert_eq!(response.state.reference, TAG);
    }

    #[tokio::test]
    async fn test_delete() {
        let mut client = FakeClient::new();
        client.missing.insert(TAG.into());
        let index = Index::new(&client);

        let state = IndexState {
            args: index_args(),
            reference: TAG.into(),
        };
        index.delete(&state).await.unwrap();
        assert_eq!(client.calls(), vec![format!("manifest_delete {TAG}")]);

        let mut unpushed = state.clone();
        unpushed.args.push = Some(false);
        let client = FakeClient::new();
        Index::new(&client).delete(&unpushed).await.unwrap();
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_diff_replaces_on_tag_change() {
        let state = IndexState {
            args: index_args(),
            reference: TAG.into(),
        };
        let mut news = index_args();
        news.tag = "docker.io/dockerbuildbot/buildkit-e2e:other".into();

        let diff = Index::diff(&state, &news);
        assert!(diff.replaces());
    }
}
