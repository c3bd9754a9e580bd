//! Dockerfileの構文チェック
//!
//! ビルド前に明らかな誤りを検出するための軽量なパーサー。
//! 命令の引数の意味までは解釈しない。

use crate::error::{CoreError, Result};
use regex::Regex;
use std::sync::LazyLock;

const INSTRUCTIONS: &[&str] = &[
    "ADD",
    "ARG",
    "CMD",
    "COPY",
    "ENTRYPOINT",
    "ENV",
    "EXPOSE",
    "FROM",
    "HEALTHCHECK",
    "LABEL",
    "MAINTAINER",
    "ONBUILD",
    "RUN",
    "SHELL",
    "STOPSIGNAL",
    "USER",
    "VOLUME",
    "WORKDIR",
];

/// ヒアドキュメントを受け付ける命令
const HEREDOC_INSTRUCTIONS: &[&str] = &["ADD", "COPY", "RUN"];

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#\s*([a-zA-Z][a-zA-Z0-9]*)\s*=\s*(.+?)\s*$").expect("directive regex")
});

static HEREDOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<<(-?)(?:"([A-Za-z0-9_]+)"|'([A-Za-z0-9_]+)'|([A-Za-z0-9_]+))"#)
        .expect("heredoc regex")
});

/// 論理行（継続行を結合した命令）
#[derive(Debug)]
struct Instruction {
    line: usize,
    keyword: String,
    args: String,
}

/// Dockerfileの内容を検証する
pub fn check_dockerfile(contents: &str) -> Result<()> {
    let instructions = parse(contents)?;
    if instructions.is_empty() {
        return Err(CoreError::syntax(0, "file with no instructions"));
    }

    let mut in_stage = false;
    for inst in &instructions {
        validate_keyword(inst.line, &inst.keyword)?;
        match inst.keyword.as_str() {
            "FROM" => {
                check_from(inst)?;
                in_stage = true;
            }
            "ARG" => {}
            "ONBUILD" => {
                if !in_stage {
                    return Err(CoreError::syntax(inst.line, "no build stage in current context"));
                }
                let Some(next) = inst.args.split_whitespace().next() else {
                    return Err(CoreError::syntax(inst.line, "ONBUILD requires at least one argument"));
                };
                let next = next.to_uppercase();
                validate_keyword(inst.line, &next)?;
                if matches!(next.as_str(), "ONBUILD" | "FROM" | "MAINTAINER") {
                    return Err(CoreError::syntax(
                        inst.line,
                        format!("{next} isn't allowed as an ONBUILD trigger"),
                    ));
                }
            }
            _ => {
                if !in_stage {
                    return Err(CoreError::syntax(inst.line, "no build stage in current context"));
                }
            }
        }
    }
    Ok(())
}

fn validate_keyword(line: usize, keyword: &str) -> Result<()> {
    if INSTRUCTIONS.contains(&keyword) {
        Ok(())
    } else {
        Err(CoreError::syntax(line, format!("unknown instruction: {keyword}")))
    }
}

fn check_from(inst: &Instruction) -> Result<()> {
    let args: Vec<&str> = inst
        .args
        .split_whitespace()
        .filter(|a| !a.starts_with("--"))
        .collect();
    match args.as_slice() {
        [_] => Ok(()),
        [_, as_kw, _] if as_kw.eq_ignore_ascii_case("as") => Ok(()),
        [_, _, _] => Err(CoreError::syntax(
            inst.line,
            "when using FROM with three arguments, the second argument must be \"AS\"",
        )),
        _ => Err(CoreError::syntax(
            inst.line,
            "FROM requires either one or three arguments",
        )),
    }
}

fn parse(contents: &str) -> Result<Vec<Instruction>> {
    let mut escape = '\\';
    let mut directives_allowed = true;
    let mut instructions = Vec::new();

    let mut lines = contents.lines().enumerate().map(|(i, l)| (i + 1, l));
    let mut pending: Option<(usize, String)> = None;

    while let Some((number, raw)) = lines.next() {
        let trimmed = raw.trim();

        if directives_allowed {
            if let Some(caps) = DIRECTIVE_RE.captures(trimmed) {
                if caps[1].eq_ignore_ascii_case("escape") {
                    escape = match &caps[2] {
                        "`" => '`',
                        "\\" => '\\',
                        other => {
                            return Err(CoreError::syntax(
                                number,
                                format!("invalid escape token '{other}' does not match ` or \\"),
                            ));
                        }
                    };
                }
                continue;
            }
            directives_allowed = false;
        }

        if trimmed.starts_with('#') {
            continue;
        }
        // 空行は継続行の途中でも読み飛ばす
        if trimmed.is_empty() {
            continue;
        }

        let (start, mut text) = pending.take().unwrap_or((number, String::new()));
        let body = raw.trim_end();
        if let Some(stripped) = body.strip_suffix(escape) {
            text.push_str(stripped);
            text.push(' ');
            pending = Some((start, text));
            continue;
        }
        text.push_str(body);

        let inst = split_instruction(start, &text);
        if HEREDOC_INSTRUCTIONS.contains(&inst.keyword.as_str()) {
            for caps in HEREDOC_RE.captures_iter(&inst.args) {
                let strip_tabs = &caps[1] == "-";
                let word = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                consume_heredoc(&mut lines, start, &word, strip_tabs)?;
            }
        }
        instructions.push(inst);
    }

    if let Some((start, text)) = pending {
        if !text.trim().is_empty() {
            instructions.push(split_instruction(start, &text));
        }
    }

    Ok(instructions)
}

fn split_instruction(line: usize, text: &str) -> Instruction {
    let text = text.trim();
    let (keyword, args) = text
        .split_once(char::is_whitespace)
        .unwrap_or((text, ""));
    Instruction {
        line,
        keyword: keyword.to_uppercase(),
        args: args.trim().to_string(),
    }
}

fn consume_heredoc<'a>(
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    start: usize,
    word: &str,
    strip_tabs: bool,
) -> Result<()> {
    for (_, line) in lines.by_ref() {
        let candidate = if strip_tabs {
            line.trim_start_matches('\t')
        } else {
            line
        };
        if candidate == word {
            return Ok(());
        }
    }
    Err(CoreError::syntax(
        start,
        format!("unterminated heredoc {word}"),
    ))
}
