mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "probe")]
#[command(about = "作って、確かめて、必ず片付ける。インフラのプロビジョニングテスト", long_about = None)]
struct Cli {
    /// 詳細ログを出力 (RUST_LOG が優先)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// スイートを実行 (apply → validate → destroy)
    Run {
        /// 実行するスイート名（省略時は全スイート）
        suites: Vec<String>,
        /// スイートファイルのパス（省略時は自動検出）
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// 結果をJSONで出力
        #[arg(long)]
        json: bool,
        /// スイートを1つずつ順番に実行
        #[arg(long)]
        sequential: bool,
        /// 使用する terraform 互換バイナリ (terraform, tofu)
        #[arg(long, env = "PROBE_TERRAFORM_BINARY", default_value = "terraform")]
        terraform: String,
    },
    /// スイートファイルを検証
    Validate {
        /// スイートファイルのパス（省略時は自動検出）
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // レポートはstdout、ログはstderr
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            suites,
            file,
            json,
            sequential,
            terraform,
        } => {
            let args = commands::run::RunArgs {
                suites,
                file,
                json,
                sequential,
                terraform,
            };
            if !commands::run::handle(args).await? {
                std::process::exit(1);
            }
        }
        Commands::Validate { file } => {
            commands::validate::handle(file)?;
        }
        Commands::Version => {
            println!("infraprobe {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
