//! 既存の状態と新しい入力の差分

use crate::encoding::Encode;
use crate::error::Result;
use crate::hash::hash_build_context;
use crate::model::{ImageArgs, ImageState, IndexArgs, IndexState};
use serde::Serialize;
use std::collections::BTreeMap;

/// プロパティの変更の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiffKind {
    /// その場で更新する
    Update,
    /// 作り直す
    UpdateReplace,
}

/// プロパティごとの差分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResponse {
    pub detailed: BTreeMap<String, DiffKind>,
}

impl DiffResponse {
    pub fn has_changes(&self) -> bool {
        !self.detailed.is_empty()
    }

    /// 作り直しが必要な変更があるか
    pub fn replaces(&self) -> bool {
        self.detailed.values().any(|k| *k == DiffKind::UpdateReplace)
    }

    fn update(&mut self, property: impl Into<String>) {
        self.detailed.insert(property.into(), DiffKind::Update);
    }

    fn replace(&mut self, property: impl Into<String>) {
        self.detailed.insert(property.into(), DiffKind::UpdateReplace);
    }

    fn update_if(&mut self, changed: bool, property: &str) {
        if changed {
            self.update(property);
        }
    }
}

impl ImageState {
    /// 新しい入力との差分を計算する
    ///
    /// レジストリのパスワードの変更は無視する。ビルドコンテキストの
    /// ハッシュが変わった場合は `contextHash` を更新として報告する。
    pub fn diff(&self, news: &ImageArgs) -> Result<DiffResponse> {
        let olds = &self.args;
        let mut diff = DiffResponse::default();

        diff.update_if(olds.add_hosts != news.add_hosts, "addHosts");
        diff.update_if(olds.build_args != news.build_args, "buildArgs");
        diff.update_if(olds.build_on_preview != news.build_on_preview, "buildOnPreview");
        diff.update_if(olds.builder != news.builder, "builder");
        diff.update_if(olds.cache_from != news.cache_from, "cacheFrom");
        diff.update_if(olds.cache_to != news.cache_to, "cacheTo");
        diff.update_if(
            olds.context_location() != news.context_location(),
            "context.location",
        );
        diff.update_if(olds.named_contexts() != news.named_contexts(), "context.named");
        diff.update_if(
            olds.dockerfile_location() != news.dockerfile_location(),
            "dockerfile.location",
        );
        diff.update_if(inline(olds) != inline(news), "dockerfile.inline");
        // エクスポートは文字列表現で比較する
        diff.update_if(encoded_exports(olds) != encoded_exports(news), "exports");
        diff.update_if(olds.labels != news.labels, "labels");
        diff.update_if(olds.load != news.load, "load");
        diff.update_if(olds.network != news.network, "network");
        diff.update_if(olds.no_cache != news.no_cache, "noCache");
        diff.update_if(olds.platforms != news.platforms, "platforms");
        diff.update_if(olds.pull != news.pull, "pull");
        diff.update_if(olds.push != news.push, "push");
        diff.update_if(olds.secrets != news.secrets, "secrets");
        diff.update_if(olds.ssh != news.ssh, "ssh");
        diff.update_if(olds.tags != news.tags, "tags");
        diff.update_if(olds.target != news.target, "target");
        diff.update_if(olds.exec != news.exec, "exec");

        // pull=true はベースイメージを常に最新に保つため毎回ビルドする
        if news.pull && (!news.exports.is_empty() || news.push || news.load) {
            diff.update("contextHash");
        }

        let hash = hash_build_context(
            news.context_location(),
            news.dockerfile_location(),
            &news.named_contexts(),
        )?;
        if hash != self.context_hash {
            tracing::debug!(old = %self.context_hash, new = %hash, "build context changed");
            diff.update("contextHash");
        }

        if olds.registries.len() != news.registries.len() {
            diff.update("registries");
        } else if let Some(idx) = olds
            .registries
            .iter()
            .zip(&news.registries)
            .position(|(old, new)| !old.same_identity(new))
        {
            diff.update(format!("registries[{idx}]"));
        }

        Ok(diff)
    }
}

fn inline(args: &ImageArgs) -> Option<&str> {
    args.dockerfile.as_ref().and_then(|d| d.inline_contents())
}

fn encoded_exports(args: &ImageArgs) -> Vec<String> {
    args.exports.iter().map(Encode::encode).collect()
}

impl IndexState {
    /// 新しい入力との差分を計算する（パスワードの変更は無視する）
    pub fn diff(&self, news: &IndexArgs) -> DiffResponse {
        let olds = &self.args;
        let mut diff = DiffResponse::default();

        if olds.tag != news.tag {
            diff.replace("tag");
        }
        diff.update_if(olds.sources != news.sources, "sources");

        match (&olds.registry, &news.registry) {
            (Some(old), Some(new)) => {
                if old.address != new.address {
                    if old.address.is_empty() {
                        diff.update("registry.address");
                    } else {
                        diff.replace("registry.address");
                    }
                }
                diff.update_if(old.username() != new.username(), "registry.username");
            }
            (None, Some(_)) | (Some(_), None) => diff.update("registry"),
            (None, None) => {}
        }

        diff
    }
}
