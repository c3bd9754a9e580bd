//! buildx CLIが受け付けるカンマ区切り形式へのエンコード

use std::collections::BTreeMap;

/// CLI引数としての文字列表現
///
/// 値が設定されていない部分は空文字列になり、結合時に読み飛ばされる。
pub trait Encode {
    fn encode(&self) -> String;
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self) -> String {
        self.as_ref().map(Encode::encode).unwrap_or_default()
    }
}

impl<T: Encode> Encode for Box<T> {
    fn encode(&self) -> String {
        self.as_ref().encode()
    }
}

/// 空でない部分をカンマで結合する
pub fn join<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .filter(|p| !p.as_ref().is_empty())
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// `key=value`（値が未設定または空なら空文字列）
pub(crate) fn kv(key: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => format!("{key}={v}"),
        _ => String::new(),
    }
}

/// `key=true|false`（未設定なら空文字列）
pub(crate) fn kv_bool(key: &str, value: Option<bool>) -> String {
    value.map(|v| format!("{key}={v}")).unwrap_or_default()
}

/// 複数の `name=..` を並べる
pub(crate) fn names(names: &[String]) -> String {
    join(names.iter().map(|n| kv("name", Some(n))))
}

/// キー順の `annotation.k=v`
pub(crate) fn annotations(annotations: &BTreeMap<String, String>) -> String {
    join(
        annotations
            .iter()
            .map(|(k, v)| format!("annotation.{k}={v}")),
    )
}
