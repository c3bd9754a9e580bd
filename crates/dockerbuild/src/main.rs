mod commands;
mod manifest;
mod state;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockerbuild")]
#[command(about = "YAMLで宣言したイメージとマニフェストリストをビルドする", long_about = None)]
struct Cli {
    /// ビルドマニフェスト（デフォルト: ./dockerbuild.build.yaml）
    #[arg(short, long, global = true, env = "DOCKERBUILD_FILE")]
    file: Option<PathBuf>,
    /// 状態ファイルの保存先
    #[arg(
        long,
        global = true,
        env = "DOCKERBUILD_STATE_DIR",
        default_value = state::DEFAULT_STATE_DIR
    )]
    state_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// マニフェストを検証
    Check {
        /// 未確定の値を許容して検証する
        #[arg(long)]
        preview: bool,
    },
    /// イメージとインデックスをビルドして状態を保存
    Up {
        /// ビルドせずに結果だけ確認する（buildOnPreview が true のイメージはビルドする）
        #[arg(long)]
        preview: bool,
    },
    /// 保存済みの状態とマニフェストの差分を表示
    Diff,
    /// レジストリから状態を読み直す
    Refresh,
    /// 状態にあるイメージとインデックスを削除
    Down,
    /// ビルドコンテキストのハッシュを表示
    Hash {
        /// コンテキストのディレクトリ（省略時はマニフェストの全イメージ）
        context: Option<String>,
        /// Dockerfileのパス
        #[arg(short, long)]
        dockerfile: Option<String>,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Versionとコンテキスト指定のHashはマニフェスト不要
    match &cli.command {
        Commands::Version => {
            println!("dockerbuild {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Hash {
            context: Some(context),
            dockerfile,
        } => {
            return commands::hash::handle_context(context, dockerfile.as_deref());
        }
        _ => {}
    }

    let workspace = commands::Workspace::load(cli.file, &cli.state_dir)?;

    match cli.command {
        Commands::Check { preview } => commands::check::handle(&workspace, preview)?,
        Commands::Up { preview } => commands::up::handle(&workspace, preview).await?,
        Commands::Diff => commands::diff::handle(&workspace)?,
        Commands::Refresh => commands::refresh::handle(&workspace).await?,
        Commands::Down => commands::down::handle(&workspace).await?,
        Commands::Hash { .. } => commands::hash::handle(&workspace)?,
        Commands::Version => {}
    }

    Ok(())
}
