//! イメージ参照（`[domain/]path[:tag][@digest]`）のパース

use crate::error::{CoreError, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

pub const DEFAULT_DOMAIN: &str = "docker.io";
const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";
const OFFICIAL_REPO_PREFIX: &str = "library/";
pub const DEFAULT_TAG: &str = "latest";
const NAME_TOTAL_LENGTH_MAX: usize = 255;

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alnum = "[a-z0-9]+";
    let separator = "(?:[._]|__|[-]+)";
    let path_component = format!("{alnum}(?:{separator}{alnum})*");
    let domain_component = "(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])";
    let domain_name = format!(r"{domain_component}(?:\.{domain_component})*");
    let ipv6 = r"\[[a-fA-F0-9:]+\]";
    let domain = format!("(?:{domain_name}|{ipv6})(?::[0-9]+)?");
    let name = format!("(?:{domain}/)?{path_component}(?:/{path_component})*");
    let tag = "[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}";
    let digest = "[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,}";
    Regex::new(&format!("^({name})(?::({tag}))?(?:@({digest}))?$"))
        .expect("reference grammar is a valid regex")
});

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-f0-9]{64}$").expect("identifier is a valid regex"));

/// パース済みのイメージ参照
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl Reference {
    /// 文法どおりにパースする（`docker.io` などの補完はしない）
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(CoreError::invalid_reference(
                s,
                "repository name must have at least one component",
            ));
        }

        let Some(caps) = REFERENCE_RE.captures(s) else {
            let message = if REFERENCE_RE.is_match(&s.to_lowercase()) {
                "repository name must be lowercase"
            } else {
                "invalid reference format"
            };
            return Err(CoreError::invalid_reference(s, message));
        };

        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if name.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(CoreError::invalid_reference(
                s,
                format!("repository name must not be more than {NAME_TOTAL_LENGTH_MAX} characters"),
            ));
        }

        Ok(Self {
            name: name.to_string(),
            tag: caps.get(2).map(|m| m.as_str().to_string()),
            digest: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }

    /// Docker Hubの省略形を補完してパースする
    ///
    /// `nginx` は `docker.io/library/nginx` になる。
    pub fn parse_normalized(s: &str) -> Result<Self> {
        if IDENTIFIER_RE.is_match(s) {
            return Err(CoreError::invalid_reference(
                s,
                format!("invalid repository name ({s}), cannot specify 64-byte hexadecimal strings"),
            ));
        }

        let (domain, remainder) = split_docker_domain(s);
        let remote_name = remainder
            .split_once(':')
            .map(|(name, _)| name)
            .unwrap_or(remainder.as_str());
        if remote_name.to_lowercase() != remote_name {
            return Err(CoreError::invalid_reference(
                s,
                format!("invalid reference format: repository name ({remote_name}) must be lowercase"),
            ));
        }

        Self::parse(&format!("{domain}/{remainder}"))
    }

    /// 完全修飾された参照だけを受け付ける
    pub fn parse_named(s: &str) -> Result<Self> {
        let r = Self::parse_normalized(s)?;
        if r.to_string() != s {
            return Err(CoreError::invalid_reference(
                s,
                "repository name must be canonical",
            ));
        }
        Ok(r)
    }

    /// 補完してパースし、タグもダイジェストもなければ `latest` を付ける
    pub fn normalize(s: &str) -> Result<Self> {
        let r = Self::parse_normalized(s)?;
        if r.digest.is_some() {
            Ok(r)
        } else {
            Ok(r.with_default_tag())
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// レジストリのホスト名
    pub fn domain(&self) -> String {
        split_docker_domain(&self.name).0
    }

    /// レジストリ内のリポジトリパス
    pub fn path(&self) -> String {
        split_docker_domain(&self.name).1
    }

    pub fn with_default_tag(mut self) -> Self {
        if self.tag.is_none() {
            self.tag = Some(DEFAULT_TAG.to_string());
        }
        self
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// `domain/path@digest`（ダイジェストがあればタグを省く）
    pub fn common_name(&self) -> String {
        let base = format!("{}/{}", self.domain(), self.path());
        match (&self.digest, &self.tag) {
            (Some(d), _) => format!("{base}@{d}"),
            (None, Some(t)) => format!("{base}:{t}"),
            (None, None) => base,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

/// 名前をレジストリのドメインとリポジトリパスに分ける
fn split_docker_domain(name: &str) -> (String, String) {
    let (mut domain, mut remainder) = match name.split_once('/') {
        Some((first, rest))
            if first.contains(['.', ':'])
                || first == "localhost"
                || first.to_lowercase() != first =>
        {
            (first.to_string(), rest.to_string())
        }
        _ => (DEFAULT_DOMAIN.to_string(), name.to_string()),
    };

    if domain == LEGACY_DEFAULT_DOMAIN {
        domain = DEFAULT_DOMAIN.to_string();
    }
    if domain == DEFAULT_DOMAIN && !remainder.contains('/') {
        remainder = format!("{OFFICIAL_REPO_PREFIX}{remainder}");
    }
    (domain, remainder)
}

/// 完全修飾タグにダイジェストを付けた `name:tag@digest` を返す
///
/// タグが完全修飾でない場合やダイジェストが不正な場合は `None`。
pub fn add_digest(reference: &str, digest: &str) -> Option<String> {
    let named = Reference::parse_named(reference).ok()?;
    let tag = named.tag().unwrap_or(DEFAULT_TAG);
    let full = Reference::parse(&format!("{}:{}@{}", named.name(), tag, digest)).ok()?;
    Some(full.to_string())
}

/// 認証情報の検索に使うレジストリのホスト名
pub fn registry_host(reference: &str) -> Option<String> {
    Reference::parse_normalized(reference)
        .ok()
        .map(|r| r.domain())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:98ea6e4f216f2fb4b69fff9b3a44842c38686ca685f3f55dc48c5d3fb1107be4";

    #[test]
    fn test_parse() {
        let r = Reference::parse("docker.io/library/nginx:1.25").unwrap();
        assert_eq!(r.name(), "docker.io/library/nginx");
        assert_eq!(r.tag(), Some("1.25"));
        assert_eq!(r.digest(), None);

        let r = Reference::parse("localhost:5000/app").unwrap();
        assert_eq!(r.domain(), "localhost:5000");
        assert_eq!(r.path(), "app");

        let r = Reference::parse(&format!("ghcr.io/me/app@{DIGEST}")).unwrap();
        assert_eq!(r.digest(), Some(DIGEST));
    }

    #[test]
    fn test_parse_errors() {
        let err = Reference::parse("").unwrap_err();
        assert!(err.reason().contains("at least one component"));

        let err = Reference::parse("docker.io/Foo/bar").unwrap_err();
        assert_eq!(err.reason(), "repository name must be lowercase");

        let err = Reference::parse("foo bar").unwrap_err();
        assert_eq!(err.reason(), "invalid reference format");

        assert!(Reference::parse("foo@sha256:short").is_err());
    }

    #[test]
    fn test_tag_must_be_ascii() {
        assert!(Reference::parse("docker.io/me/app:v1_2.3-rc").is_ok());
        let err = Reference::parse("docker.io/me/app:täg").unwrap_err();
        assert!(err.reason().contains("invalid reference format"));
        assert!(Reference::normalize("me/app:版本").is_err());
    }

    #[test]
    fn test_parse_normalized() {
        let r = Reference::parse_normalized("nginx").unwrap();
        assert_eq!(r.to_string(), "docker.io/library/nginx");

        let r = Reference::parse_normalized("me/app:v1").unwrap();
        assert_eq!(r.to_string(), "docker.io/me/app:v1");

        let r = Reference::parse_normalized("index.docker.io/me/app").unwrap();
        assert_eq!(r.to_string(), "docker.io/me/app");

        assert!(
            Reference::parse_normalized(
                "98ea6e4f216f2fb4b69fff9b3a44842c38686ca685f3f55dc48c5d3fb1107be4"
            )
            .is_err()
        );
        assert!(Reference::parse_normalized("docker.io/Me/app").is_err());
    }

    #[test]
    fn test_parse_named_requires_canonical() {
        assert!(Reference::parse_named("docker.io/library/nginx:latest").is_ok());
        assert!(Reference::parse_named("nginx:latest").is_err());
        assert!(Reference::parse_named("ghcr.io/me/app").is_ok());
    }

    #[test]
    fn test_normalize_adds_latest() {
        let r = Reference::normalize("nginx").unwrap();
        assert_eq!(r.to_string(), "docker.io/library/nginx:latest");

        let digested = format!("nginx@{DIGEST}");
        let r = Reference::normalize(&digested).unwrap();
        assert_eq!(r.tag(), None);
    }

    #[test]
    fn test_add_digest() {
        assert_eq!(
            add_digest("docker.io/me/app:v1", DIGEST),
            Some(format!("docker.io/me/app:v1@{DIGEST}"))
        );
        assert_eq!(
            add_digest("ghcr.io/me/app", DIGEST),
            Some(format!("ghcr.io/me/app:latest@{DIGEST}"))
        );
        assert_eq!(add_digest("app:v1", DIGEST), None);
        assert_eq!(add_digest("docker.io/me/app:v1", "not-a-digest"), None);
    }

    #[test]
    fn test_common_name() {
        let r = Reference::normalize("me/app:v1").unwrap().with_digest(DIGEST);
        assert_eq!(r.common_name(), format!("docker.io/me/app@{DIGEST}"));
    }

    #[test]
    fn test_registry_host() {
        assert_eq!(registry_host("nginx").as_deref(), Some("docker.io"));
        assert_eq!(registry_host("ghcr.io/me/app:1").as_deref(), Some("ghcr.io"));
        assert_eq!(registry_host("UPPER CASE"), None);
    }
}
