//! 未設定フィールドへのデフォルト値の適用

/// 未設定のオプションフィールドにだけデフォルト値を入れる
///
/// 設定済みの値は変更しない。二回適用しても結果は変わらない。
pub trait WithDefaults: Sized {
    fn with_defaults(self) -> Self;
}

impl<T: WithDefaults> WithDefaults for Option<T> {
    fn with_defaults(self) -> Self {
        self.map(WithDefaults::with_defaults)
    }
}

impl<T: WithDefaults> WithDefaults for Vec<T> {
    fn with_defaults(self) -> Self {
        self.into_iter().map(WithDefaults::with_defaults).collect()
    }
}

/// 環境変数の値（未設定なら空文字列）
pub(crate) fn env_or_empty(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

/// 未設定なら環境変数の値を入れる
pub(crate) fn default_from_env(field: &mut Option<String>, key: &str) {
    if field.is_none() {
        *field = Some(env_or_empty(key));
    }
}
