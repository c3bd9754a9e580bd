//! 入力の検証

use crate::defaults::WithDefaults;
use crate::encoding::Encode;
use crate::entry::{CacheEntry, ExportEntry, parse_cache, parse_export};
use crate::error::{CheckFailure, CheckFailures};
use crate::model::{
    BuildContext, CacheFrom, CacheTo, Dockerfile, Export, ImageArgs, IndexArgs, Ssh, is_remote_url,
};
use crate::options::{Build, BuildOptions};
use crate::path;
use crate::reference::Reference;
use crate::syntax::check_dockerfile;
use std::path::Path;

impl ImageArgs {
    /// デフォルト値を適用して検証する
    ///
    /// 成功した場合はDockerfileの既定の場所を埋めた引数を返す。
    pub fn check(self, preview: bool) -> Result<ImageArgs, CheckFailures> {
        let mut args = self.with_defaults();
        args.validate(preview)?;
        Ok(args)
    }

    /// 引数を検証してビルドオプションを組み立てる
    ///
    /// Dockerfileが指定されておらずコンテキストがローカルにある場合は
    /// `<context>/Dockerfile` を設定する。
    pub fn validate(&mut self, preview: bool) -> Result<BuildOptions, CheckFailures> {
        let mut failures = CheckFailures::default();

        if self.exports.len() > 1 {
            failures.push("exports", "multiple exports are currently unsupported");
        }
        if self.push && self.load {
            failures.push("push", "push and load may not be set together at the moment");
        }
        if !self.exports.is_empty() && (self.push || self.load) {
            failures.push("exports", "exports can't be provided with push or load");
        }

        let dockerfile = self.dockerfile.take().unwrap_or_default();
        let (dockerfile, failure) = validate_context(self.context.as_ref(), preview, dockerfile);
        failures.0.extend(failure);
        if let Some(failure) = validate_dockerfile(&dockerfile, preview, self.context_location()) {
            failures.0.push(failure);
        }
        self.dockerfile = Some(dockerfile);

        let normalized = self.normalize(preview);

        let mut exports = Vec::new();
        for (idx, export) in normalized.exports.iter().enumerate() {
            if export.disabled {
                continue;
            }
            match validate_export(export, preview, &self.tags) {
                Ok(entry) => exports.push(entry),
                Err(reason) => failures.push(format!("exports[{idx}]"), reason),
            }
        }

        let mut cache_from = Vec::new();
        for (idx, cache) in normalized.cache_from.iter().enumerate() {
            match validate_cache_from(cache) {
                Ok(Some(entry)) => cache_from.push(entry),
                Ok(None) => {}
                Err(reason) => failures.push(format!("cacheFrom[{idx}]"), reason),
            }
        }

        let mut cache_to = Vec::new();
        for (idx, cache) in normalized.cache_to.iter().enumerate() {
            match validate_cache_to(cache) {
                Ok(Some(entry)) => cache_to.push(entry),
                Ok(None) => {}
                Err(reason) => failures.push(format!("cacheTo[{idx}]"), reason),
            }
        }

        let mut ssh = Vec::new();
        for (idx, s) in normalized.ssh.iter().enumerate() {
            match validate_ssh(s) {
                Ok(()) => ssh.push(s.clone()),
                Err(reason) => failures.push(format!("ssh[{idx}]"), reason),
            }
        }

        for (idx, tag) in normalized.tags.iter().enumerate() {
            if let Err(e) = Reference::parse(tag) {
                failures.push(format!("tags[{idx}]"), e.reason());
            }
        }

        let opts = BuildOptions {
            build_args: normalized.build_args.clone(),
            builder: normalized.builder_name().map(str::to_string),
            cache_from,
            cache_to,
            context_path: normalized.context_location().to_string(),
            dockerfile: self.dockerfile_location().map(str::to_string),
            exports,
            extra_hosts: normalized.add_hosts.clone(),
            labels: normalized.labels.clone(),
            network: normalized.network.unwrap_or_default(),
            no_cache: normalized.no_cache,
            named_contexts: normalized.named_contexts(),
            platforms: normalized.platforms.clone(),
            pull: normalized.pull,
            secret_ids: normalized.secrets.keys().cloned().collect(),
            ssh,
            tags: normalized.tags.clone(),
            target: normalized.target.clone().filter(|t| !t.is_empty()),
        };

        failures.into_result(opts)
    }

    /// 検証してビルド指定を作る
    pub fn to_build(&self, preview: bool) -> Result<Build, CheckFailures> {
        let mut args = self.clone();
        let opts = args.validate(preview)?;

        if args.exports.is_empty() && !args.push && !args.load {
            tracing::warn!(
                "No exports were specified so the build will only remain in the local build cache. \
                 Use `push` to upload the image to a registry, or silence this warning with a `cacheonly` export."
            );
        }
        if opts.platforms.len() > 1 && !opts.cache_to.is_empty() {
            tracing::warn!(
                "Caching doesn't work reliably with multi-platform builds. \
                 Instead, perform one cached build per platform and create an Index to join them all together."
            );
        }

        let secrets = args.keep_known(preview).secrets;
        let inline = args
            .dockerfile
            .as_ref()
            .and_then(Dockerfile::inline_contents)
            .map(str::to_string);

        Ok(Build {
            opts,
            secrets,
            inline,
            exec: args.exec,
        })
    }
}

impl IndexArgs {
    /// デフォルト値を適用してタグとソースの参照を検証する
    pub fn check(self) -> Result<IndexArgs, CheckFailures> {
        let args = self.with_defaults();
        let mut failures = CheckFailures::default();

        if !args.tag.is_empty() {
            if let Err(e) = Reference::normalize(&args.tag) {
                failures.push("tag", e.reason());
            }
        }
        for (idx, source) in args.sources.iter().enumerate() {
            if source.is_empty() {
                continue;
            }
            if let Err(e) = Reference::normalize(source) {
                failures.push(format!("sources[{idx}]"), e.reason());
            }
        }

        failures.into_result(args)
    }
}

/// コンテキストを検証し、必要ならDockerfileの既定の場所を埋める
fn validate_context(
    context: Option<&BuildContext>,
    preview: bool,
    mut dockerfile: Dockerfile,
) -> (Dockerfile, Option<CheckFailure>) {
    let location = context.map(|c| c.location.as_str()).unwrap_or_default();

    // プレビュー中は値が未確定の場合がある
    if location.is_empty() && preview {
        return (dockerfile, None);
    }
    if is_remote_url(location) {
        return (dockerfile, None);
    }

    if dockerfile.location().is_none() && dockerfile.inline_contents().is_none() {
        dockerfile.location = Some(path::join(location, "Dockerfile"));
    }

    let dir = if location.is_empty() { "." } else { location };
    if Path::new(dir).is_dir() || location == "-" {
        return (dockerfile, None);
    }

    let failure = CheckFailure::new(
        "context.location",
        format!("{location:?}: not a valid directory or URL"),
    );
    (dockerfile, Some(failure))
}

fn validate_dockerfile(d: &Dockerfile, preview: bool, context: &str) -> Option<CheckFailure> {
    if d.location().is_some() && d.inline_contents().is_some() {
        return Some(CheckFailure::new(
            "dockerfile",
            r#"only specify "location" or "inline", not both"#,
        ));
    }

    if let Some(location) = d.location() {
        if is_remote_url(location) {
            return None;
        }
        let contents = match std::fs::read_to_string(location) {
            Ok(contents) => contents,
            Err(e) => return Some(CheckFailure::new("dockerfile.location", e.to_string())),
        };
        return check_dockerfile(&contents)
            .err()
            .map(|e| CheckFailure::new("dockerfile.location", e.to_string()));
    }

    if let Some(inline) = d.inline_contents() {
        return check_dockerfile(inline)
            .err()
            .map(|e| CheckFailure::new("dockerfile.inline", e.to_string()));
    }

    if !preview && !is_remote_url(context) {
        return Some(CheckFailure::new("dockerfile", "missing 'location' or 'inline'"));
    }
    None
}

fn count_types(encoded: &str) -> usize {
    encoded.matches("type=").count()
}

fn validate_export(export: &Export, preview: bool, tags: &[String]) -> Result<ExportEntry, String> {
    let encoded = export.encode();
    if count_types(&encoded) > 1 {
        return Err("exports should only specify one export type".to_string());
    }
    let mut entry = parse_export(&encoded).map_err(|e| e.reason())?;

    let has_name = entry.attrs.get("name").is_some_and(|n| !n.is_empty());
    if tags.is_empty() && entry.is_registry_push() && !has_name {
        return Err(
            "at least one tag or export name is needed when pushing to a registry".to_string(),
        );
    }

    // プレビュー中はレジストリへプッシュしない
    if preview && entry.kind == "image" {
        entry.attrs.insert("push".to_string(), "false".to_string());
    }
    Ok(entry)
}

fn validate_cache(encoded: &str, name: &str) -> Result<Option<CacheEntry>, String> {
    if encoded.is_empty() {
        return Ok(None);
    }
    if count_types(encoded) > 1 {
        return Err(format!("{name} should only specify one cache type"));
    }
    parse_cache(encoded).map_err(|e| e.reason())
}

fn validate_cache_from(cache: &CacheFrom) -> Result<Option<CacheEntry>, String> {
    validate_cache(&cache.encode(), "cacheFrom")
}

fn validate_cache_to(cache: &CacheTo) -> Result<Option<CacheEntry>, String> {
    validate_cache(&cache.encode(), "cacheTo")
}

fn validate_ssh(ssh: &Ssh) -> Result<(), String> {
    if ssh.id.is_empty() {
        return Err("an id is required".to_string());
    }
    Ok(())
}
