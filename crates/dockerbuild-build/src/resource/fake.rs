use crate::client::{Client, IMAGE_DIGEST_KEY, SolveResponse};
use crate::error::{BuildError, Result};
use crate::registry::{Descriptor, DescriptorPlatform};
use async_trait::async_trait;
use dockerbuild_core::Build;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub(crate) const DIGEST: &str =
    "sha256:98ea6e4f216f2fb4b69fff9b3a44842c38686ca685f3f55dc48c5d3fb1107be4";

/// 呼び出しを記録するだけのクライアント
pub(crate) struct FakeClient {
    pub buildkit: bool,
    /// build が返すダイジェスト
    pub digest: Option<String>,
    /// inspect の結果（なければ NotFound）
    pub manifests: HashMap<String, Vec<Descriptor>>,
    /// manifest_inspect の結果（なければ NotFound）
    pub tags: HashMap<String, String>,
    pub unauthorized: bool,
    /// delete / manifest_delete が NotFound を返す参照
    pub missing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            buildkit: true,
            digest: Some(DIGEST.to_string()),
            manifests: HashMap::new(),
            tags: HashMap::new(),
            unauthorized: false,
            missing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub(crate) fn descriptor(architecture: &str) -> Descriptor {
    Descriptor {
        media_type: "application/vnd.oci.image.manifest.v1+json".into(),
        digest: DIGEST.into(),
        size: 1,
        platform: Some(DescriptorPlatform {
            architecture: architecture.into(),
            os: (if architecture == "unknown" { "unknown" } else { "linux" }).into(),
            variant: None,
        }),
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn build(&self, build: &Build) -> Result<SolveResponse> {
        self.record(format!("build {}", build.opts.tags.join(",")));
        let mut response = SolveResponse::default();
        if let Some(digest) = &self.digest {
            response
                .exporter_response
                .insert(IMAGE_DIGEST_KEY.to_string(), digest.clone());
        }
        Ok(response)
    }

    async fn buildkit_enabled(&self) -> Result<bool> {
        Ok(self.buildkit)
    }

    async fn inspect(&self, reference: &str) -> Result<Vec<Descriptor>> {
        self.record(format!("inspect {reference}"));
        self.manifests
            .get(reference)
            .cloned()
            .ok_or_else(|| BuildError::NotFound {
                reference: reference.to_string(),
            })
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        self.record(format!("delete {reference}"));
        if self.missing.contains(reference) {
            return Err(BuildError::NotFound {
                reference: reference.to_string(),
            });
        }
        Ok(())
    }

    async fn manifest_create(&self, push: bool, target: &str, refs: &[String]) -> Result<()> {
        self.record(format!("manifest_create {target} push={push} {}", refs.join(",")));
        Ok(())
    }

    async fn manifest_inspect(&self, target: &str) -> Result<String> {
        self.record(format!("manifest_inspect {target}"));
        if self.unauthorized {
            return Err(BuildError::Unauthorized {
                reference: target.to_string(),
            });
        }
        self.tags
            .get(target)
            .cloned()
            .ok_or_else(|| BuildError::NotFound {
                reference: target.to_string(),
            })
    }

    async fn manifest_delete(&self, target: &str) -> Result<()> {
        self.record(format!("manifest_delete {target}"));
        if self.missing.contains(target) {
            return Err(BuildError::NotFound {
                reference: target.to_string(),
            });
        }
        Ok(())
    }
}
