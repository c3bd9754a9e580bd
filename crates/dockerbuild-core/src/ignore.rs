//! `.dockerignore` の読み込みとパターンマッチ

use crate::error::{CoreError, Result};
use crate::path;
use glob::MatchOptions;
use std::path::Path;

/// 1行の最大長（これを超える行はエラー）
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// ignoreファイルの内容をパターンの一覧にする
///
/// コメントと空行を除き、パスを正規化して先頭の `/` を取り除く。
pub fn read_patterns(contents: &str) -> Result<Vec<String>> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    let mut patterns = Vec::new();

    for line in contents.lines() {
        if line.len() >= MAX_LINE_LENGTH {
            return Err(CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "token too long",
            )));
        }
        if line.starts_with('#') {
            continue;
        }
        let mut pattern = line.trim();
        if pattern.is_empty() {
            continue;
        }
        let invert = pattern.starts_with('!');
        if invert {
            pattern = pattern[1..].trim();
        }
        let mut cleaned = String::new();
        if !pattern.is_empty() {
            cleaned = path::clean(pattern);
            if cleaned.len() > 1 && cleaned.starts_with('/') {
                cleaned.remove(0);
            }
        }
        if invert {
            cleaned.insert(0, '!');
        }
        patterns.push(cleaned);
    }

    Ok(patterns)
}

/// Dockerfileとコンテキストに対応するignoreパターンを探す
///
/// `<Dockerfile>.dockerignore` があればそれを優先し、
/// なければコンテキスト直下の `.dockerignore` を使う。
pub fn find_patterns(dockerfile: Option<&str>, context: &str) -> Result<Vec<String>> {
    let mut candidates = Vec::new();
    if let Some(dockerfile) = dockerfile.filter(|d| !d.is_empty()) {
        candidates.push(format!("{dockerfile}.dockerignore"));
    }
    if Path::new(context).is_dir() {
        candidates.push(path::join(context, ".dockerignore"));
    }

    for candidate in candidates {
        match std::fs::read_to_string(&candidate) {
            Ok(contents) => {
                tracing::debug!(file = %candidate, "using ignore file");
                return read_patterns(&contents);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Vec::new())
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug)]
struct Pattern {
    glob: glob::Pattern,
    exclusion: bool,
}

/// コンパイル済みのignoreパターン
#[derive(Debug, Default)]
pub struct PatternMatcher {
    patterns: Vec<Pattern>,
}

impl PatternMatcher {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut compiled = Vec::new();
        for raw in patterns {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let (exclusion, pattern) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };
            if pattern.is_empty() {
                return Err(CoreError::invalid_entry(
                    raw,
                    "illegal exclusion pattern: \"!\"",
                ));
            }
            let glob = glob::Pattern::new(&to_glob(&path::clean(pattern)))
                .map_err(|e| CoreError::invalid_entry(raw, e.to_string()))?;
            compiled.push(Pattern { glob, exclusion });
        }
        Ok(Self { patterns: compiled })
    }

    /// `!` による除外指定があるか
    pub fn has_exclusions(&self) -> bool {
        self.patterns.iter().any(|p| p.exclusion)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// パス（またはその親ディレクトリ）がパターンに一致するか
    ///
    /// 後に書かれたパターンが優先される。
    pub fn matches(&self, file: &str) -> bool {
        let file = path::clean(file);
        let parents: Vec<&str> = match file.rsplit_once('/') {
            Some((parent, _)) => parent.split('/').collect(),
            None => Vec::new(),
        };

        let mut matched = false;
        for pattern in &self.patterns {
            if pattern.exclusion != matched {
                continue;
            }
            let is_match = |candidate: &str| pattern.glob.matches_with(candidate, MATCH_OPTIONS);
            let hit = is_match(&file)
                || (1..=parents.len()).any(|i| is_match(&parents[..i].join("/")));
            if hit {
                matched = !pattern.exclusion;
            }
        }
        matched
    }
}

/// バックスラッシュによるエスケープと `[^...]` をglobの書式に直す
///
/// 文字クラス内の `]` は先頭に置く。
fn to_glob(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => out.push_str(&glob::Pattern::escape(&next.to_string())),
                None => out.push_str("[\\]"),
            },
            '[' => {
                let mut negated = false;
                if let Some('^' | '!') = chars.peek() {
                    negated = true;
                    chars.next();
                }
                let mut members = String::new();
                let mut bracket = false;
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some(']') => bracket = true,
                            Some(next) => members.push(next),
                            None => members.push('\\'),
                        },
                        other => members.push(other),
                    }
                }
                if !closed {
                    // 閉じていないクラスは文字どおりに扱う
                    out.push_str("[[]");
                    out.push_str(&glob::Pattern::escape(&members));
                    continue;
                }
                out.push('[');
                if negated {
                    out.push('!');
                }
                if bracket {
                    out.push(']');
                }
                out.push_str(&members);
                out.push(']');
            }
            other => out.push(other),
        }
    }

    out
}
