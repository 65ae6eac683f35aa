use colored::Colorize;
use std::path::PathBuf;

pub fn handle(file: Option<PathBuf>) -> anyhow::Result<()> {
    println!("{}", "スイートファイルを検証中...".blue());

    let suite_file = match super::load_suite_file(file) {
        Ok(suite_file) => suite_file,
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ 設定エラー".red().bold());
            eprintln!("  {:#}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &suite_file.path {
        println!("スイートファイル: {}", path.display().to_string().cyan());
    }
    println!("{}", "✓ スイートファイルは正常です！".green().bold());
    println!();
    println!("スイート: {}個", suite_file.suites.len());

    for suite in &suite_file.suites {
        let options = &suite.options;
        println!("  - {} ({})", suite.name.cyan(), suite.config);
        println!(
            "      retry: 最大{}回, 間隔{}s, 判定パターン{}個",
            options.retry.attempts(),
            options.retry.time_between_retries.as_secs(),
            options.retryable_errors.len()
        );
        if let Some(timeout) = options.run_timeout {
            println!("      timeout: {}s", timeout.as_secs());
        }
        if suite.assertions.is_empty() {
            println!("      {}", "expect なし (apply と destroy のみ確認)".yellow());
        }
        for assertion in &suite.assertions {
            println!("      expect: {}", assertion.describe());
        }
    }

    Ok(())
}
