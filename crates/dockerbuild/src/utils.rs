use colored::Colorize;
use dockerbuild_core::{CheckFailures, DiffKind, DiffResponse};

/// 検証エラーをプロパティごとに表示
pub fn print_failures(kind: &str, name: &str, failures: &CheckFailures) {
    println!("  {} {} {}", "✗".red(), kind, name.cyan());
    for failure in failures.iter() {
        println!(
            "      {}: {}",
            failure.property.yellow(),
            failure.reason
        );
    }
}

/// 変更のあるプロパティを表示
pub fn print_diff(kind: &str, name: &str, diff: &DiffResponse) {
    if !diff.has_changes() {
        println!("  {} {} {}", "=".dimmed(), kind, name.cyan());
        return;
    }

    let mark = if diff.replaces() {
        "±".magenta()
    } else {
        "~".yellow()
    };
    println!("  {} {} {}", mark, kind, name.cyan());
    for (property, change) in &diff.detailed {
        let label = match change {
            DiffKind::Update => "update",
            DiffKind::UpdateReplace => "replace",
        };
        println!("      {} ({})", property, label.dimmed());
    }
}

pub fn print_create(kind: &str, name: &str) {
    println!("  {} {} {}", "+".green(), kind, name.cyan());
}

pub fn print_delete(kind: &str, name: &str) {
    println!("  {} {} {}", "-".red(), kind, name.cyan());
}

/// 見出し付きで件数を表示
pub fn print_summary(action: &str, succeeded: usize, failed: usize) {
    println!();
    if failed == 0 {
        println!("{}", format!("✓ {}: {} 件", action, succeeded).green().bold());
    } else {
        println!(
            "{}",
            format!("✗ {}: {} 件成功, {} 件失敗", action, succeeded, failed)
                .red()
                .bold()
        );
    }
}
