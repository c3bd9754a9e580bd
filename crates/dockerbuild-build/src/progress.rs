use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// リソース操作中のスピナー
pub struct BuildProgress {
    progress_bar: ProgressBar,
}

impl BuildProgress {
    pub fn new(action: &str, resource: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb.set_message(format!("{} {}...", action, resource));

        Self { progress_bar: pb }
    }

    /// 表示しないスピナー（非対話環境やテスト用）
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
        }
    }

    /// ビルド出力の1行を表示
    pub fn set_message(&self, msg: &str) {
        self.progress_bar.set_message(msg.to_string());
    }

    pub fn finish_success(&self, message: &str) {
        self.progress_bar
            .finish_with_message(format!("{} {}", message, "✓".green()));
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .abandon_with_message(format!("{} {}", "Failed:".red().bold(), error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_progress_accepts_updates() {
        let progress = BuildProgress::hidden();
        progress.set_message("#1 [internal] load build definition");
        progress.finish_success("built");
        progress.finish_error("boom");
    }
}
