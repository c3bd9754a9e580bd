//! buildx形式のエクスポート・キャッシュ指定のパース

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// パース済みのエクスポート指定（`--output`）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub destination: Option<String>,
}

impl ExportEntry {
    /// `type=image,push=true`（`type=registry` を含む）かどうか
    pub fn is_registry_push(&self) -> bool {
        self.kind == "image" && self.attrs.get("push").map(String::as_str) == Some("true")
    }

    /// CLIに渡す形へ戻す
    pub fn to_csv(&self) -> String {
        let mut parts = vec![format!("type={}", self.kind)];
        if let Some(dest) = &self.destination {
            parts.push(format!("dest={dest}"));
        }
        parts.extend(self.attrs.iter().map(|(k, v)| csv_field(&format!("{k}={v}"))));
        parts.join(",")
    }
}

/// パース済みのキャッシュ指定（`--cache-from` / `--cache-to`）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl CacheEntry {
    pub fn to_csv(&self) -> String {
        let mut parts = vec![format!("type={}", self.kind)];
        parts.extend(self.attrs.iter().map(|(k, v)| csv_field(&format!("{k}={v}"))));
        parts.join(",")
    }
}

/// エクスポート指定をパースする
///
/// `type=` を含まない単一の値はローカルディレクトリ（`-` はtarの標準出力）として扱う。
/// `type=registry` は `type=image,push=true` に置き換える。
pub fn parse_export(input: &str) -> Result<ExportEntry> {
    let fields = split_csv(input)?;

    if fields.len() == 1 && fields[0] == input && !input.starts_with("type=") {
        let kind = if input == "-" { "tar" } else { "local" };
        return Ok(ExportEntry {
            kind: kind.to_string(),
            attrs: BTreeMap::new(),
            destination: Some(input.to_string()),
        });
    }

    let (kind, mut attrs) = parse_fields(input, &fields)?;
    let Some(mut kind) = kind else {
        return Err(CoreError::invalid_entry(input, "type is required for output"));
    };

    if kind == "registry" {
        kind = "image".to_string();
        attrs
            .entry("push".to_string())
            .or_insert_with(|| "true".to_string());
    }

    let destination = attrs.remove("dest");

    Ok(ExportEntry {
        kind,
        attrs,
        destination,
    })
}

/// キャッシュ指定をパースする
///
/// `type=` を含まない単一の値はレジストリの参照として扱う。
/// GitHub Actionsのキャッシュで接続情報が揃わない場合は `None`（無効）を返す。
pub fn parse_cache(input: &str) -> Result<Option<CacheEntry>> {
    let fields = split_csv(input)?;

    if fields.len() == 1 && !fields[0].contains('=') {
        let mut attrs = BTreeMap::new();
        attrs.insert("ref".to_string(), fields[0].clone());
        return Ok(Some(CacheEntry {
            kind: "registry".to_string(),
            attrs,
        }));
    }

    let (kind, mut attrs) = parse_fields(input, &fields)?;
    let Some(kind) = kind else {
        return Err(CoreError::invalid_entry(input, "type is required for cache"));
    };

    match kind.as_str() {
        "gha" => {
            if !attrs.contains_key("url") {
                let url = std::env::var("ACTIONS_CACHE_URL")
                    .or_else(|_| std::env::var("ACTIONS_RUNTIME_URL"))
                    .unwrap_or_default();
                if !url.is_empty() {
                    attrs.insert("url".to_string(), url);
                }
            }
            if !attrs.contains_key("token") {
                let token = std::env::var("ACTIONS_RUNTIME_TOKEN").unwrap_or_default();
                if !token.is_empty() {
                    attrs.insert("token".to_string(), token);
                }
            }
            if !attrs.contains_key("url") || !attrs.contains_key("token") {
                tracing::debug!(entry = input, "GitHub Actions cache is inactive");
                return Ok(None);
            }
        }
        "s3" => {
            if !attrs.contains_key("region") {
                let region = std::env::var("AWS_REGION").unwrap_or_default();
                if !region.is_empty() {
                    attrs.insert("region".to_string(), region);
                }
            }
        }
        _ => {}
    }

    Ok(Some(CacheEntry { kind, attrs }))
}

fn parse_fields(
    input: &str,
    fields: &[String],
) -> Result<(Option<String>, BTreeMap<String, String>)> {
    let mut kind = None;
    let mut attrs = BTreeMap::new();
    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            return Err(CoreError::invalid_entry(
                input,
                format!("invalid value {field}"),
            ));
        };
        let key = key.trim().to_lowercase();
        if key == "type" {
            kind = Some(value.to_string());
        } else {
            attrs.insert(key, value.to_string());
        }
    }
    Ok((kind, attrs))
}

/// CSVの1行をフィールドに分割する（ダブルクォートに対応）
fn split_csv(input: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() || current.ends_with('=') => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(CoreError::invalid_entry(input, "unterminated quoted field"));
    }
    fields.push(current);
    Ok(fields)
}

fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
