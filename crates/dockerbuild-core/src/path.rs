//! スラッシュ区切りパスの字句的な正規化

/// `.` と `..` を解決し、重複したスラッシュを取り除く
///
/// 空になった場合は `.` を返す。ファイルシステムにはアクセスしない。
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// `base` と `name` を結合して正規化する
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        clean(name)
    } else {
        clean(&format!("{base}/{name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean(""), ".");
        assert_eq!(clean("./a/b/"), "a/b");
        assert_eq!(clean("../internal/../internal/testdata/noop"), "../internal/testdata/noop");
        assert_eq!(clean("/../a"), "/a");
        assert_eq!(clean("a/.."), ".");
        assert_eq!(clean("a//b"), "a/b");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "Dockerfile"), "Dockerfile");
        assert_eq!(join("app", "Dockerfile"), "app/Dockerfile");
        assert_eq!(join("./app/", "Dockerfile"), "app/Dockerfile");
    }
}
