//! プレビュー時の未確定値の除去

use crate::encoding::Encode;
use crate::model::{BuildContext, Export, ImageArgs, Registry};
use std::collections::BTreeMap;

/// プレビュー中は未確定の値が空文字列として渡されるため、それらを取り除く
struct Keeper {
    preview: bool,
}

impl Keeper {
    fn string(&self, s: &str) -> bool {
        !self.preview || !s.is_empty()
    }

    fn strings(&self, items: &[String]) -> Vec<String> {
        items.iter().filter(|s| self.string(s)).cloned().collect()
    }

    /// 無効化されたエントリはそのまま残す
    fn encoded<T: Encode + Clone>(&self, items: &[T], disabled: impl Fn(&T) -> bool) -> Vec<T> {
        items
            .iter()
            .filter(|item| disabled(item) || self.string(&item.encode()))
            .cloned()
            .collect()
    }

    fn map(&self, m: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        m.iter()
            .filter(|(k, v)| self.string(k) && self.string(v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// アドレスとパスワードが確定しているレジストリだけを残す
    fn registries(&self, registries: &[Registry]) -> Vec<Registry> {
        registries
            .iter()
            .filter(|r| !self.preview || (!r.address.is_empty() && !r.password().is_empty()))
            .cloned()
            .collect()
    }

    fn context(&self, context: &Option<BuildContext>) -> Option<BuildContext> {
        let context = context.as_ref()?;
        Some(BuildContext {
            location: context.location.clone(),
            named: context
                .named
                .iter()
                .filter(|(name, c)| self.string(name) && self.string(&c.location))
                .map(|(name, c)| (name.clone(), c.clone()))
                .collect(),
        })
    }
}

impl ImageArgs {
    /// 未確定の要素を取り除いたコピーを返す（`preview` がfalseなら変更しない）
    pub fn keep_known(&self, preview: bool) -> ImageArgs {
        let k = Keeper { preview };
        ImageArgs {
            add_hosts: k.strings(&self.add_hosts),
            build_args: k.map(&self.build_args),
            build_on_preview: self.build_on_preview,
            builder: self.builder.clone(),
            cache_from: k.encoded(&self.cache_from, |c| c.disabled),
            cache_to: k.encoded(&self.cache_to, |c| c.disabled),
            context: k.context(&self.context),
            dockerfile: self.dockerfile.clone(),
            exports: k.encoded(&self.exports, |e| e.disabled),
            labels: k.map(&self.labels),
            load: self.load,
            network: self.network,
            no_cache: self.no_cache,
            platforms: self.platforms.clone(),
            pull: self.pull,
            push: self.push,
            registries: k.registries(&self.registries),
            secrets: k.map(&self.secrets),
            ssh: k.encoded(&self.ssh, |_| false),
            tags: k.strings(&self.tags),
            target: self.target.clone(),
            exec: self.exec,
        }
    }

    /// 未確定の要素を取り除き、`push` / `load` の短縮形をエクスポートに展開する
    pub fn normalize(&self, preview: bool) -> ImageArgs {
        let mut normalized = self.keep_known(preview);
        if normalized.push {
            normalized.exports.push(Export {
                raw: Some("type=registry".to_string()),
                ..Default::default()
            });
        }
        if normalized.load {
            normalized.exports.push(Export {
                raw: Some("type=docker".to_string()),
                ..Default::default()
            });
        }
        normalized
    }

    /// 未確定の値がなく、プレビュー中でもビルドできるか
    pub fn buildable(&self) -> bool {
        self.keep_known(true) == *self
    }
}
