use colored::Colorize;
use infraprobe_core::{LifecycleController, RunOutcome, Schedule, run_suites};
use infraprobe_provision::Terraform;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct RunArgs {
    pub suites: Vec<String>,
    pub file: Option<PathBuf>,
    pub json: bool,
    pub sequential: bool,
    pub terraform: String,
}

/// Returns whether every selected suite passed
pub async fn handle(args: RunArgs) -> anyhow::Result<bool> {
    let suite_file = super::load_suite_file(args.file)?;
    let selected = suite_file.select(&args.suites)?;

    let mut terraform = Terraform::new().with_binary(&args.terraform);
    if let Some(base) = suite_file.path.as_deref().and_then(|p| p.parent()) {
        terraform = terraform.with_module_root(base.join(".infraprobe").join("modules"));
    }

    let cancel = CancellationToken::new();
    let controller =
        LifecycleController::new(Arc::new(terraform)).with_cancellation(cancel.clone());
    let signal = tokio::spawn(watch_ctrl_c(cancel));

    let schedule = if args.sequential {
        Schedule::Sequential
    } else {
        Schedule::Concurrent
    };

    if !args.json {
        println!(
            "{} {}個のスイートを実行中 ({})...",
            "▶".blue(),
            selected.len(),
            args.terraform.cyan()
        );
        println!();
    }

    let outcomes = run_suites(&controller, &selected, schedule).await;
    signal.abort();
    let outcomes = outcomes?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            print_report(outcome);
        }
        print_summary(&outcomes);
    }

    Ok(outcomes.iter().all(RunOutcome::is_success))
}

/// First Ctrl-C cancels the runs (teardown continues), a second one exits.
async fn watch_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    eprintln!(
        "{}",
        "⚠ 中断しています。作成済みのリソースを削除中です (もう一度 Ctrl-C で強制終了)".yellow()
    );
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!(
            "{}",
            "✗ 強制終了しました。リソースが残っている可能性があります".red().bold()
        );
        std::process::exit(130);
    }
}

fn print_report(outcome: &RunOutcome) {
    let report = outcome.report();
    let mut lines = report.lines();

    if let Some(header) = lines.next() {
        if outcome.is_success() {
            println!("{}", header.green().bold());
        } else {
            println!("{}", header.red().bold());
        }
    }
    for line in lines {
        println!("{}", line);
    }
    println!();
}

fn print_summary(outcomes: &[RunOutcome]) {
    let passed = outcomes.iter().filter(|o| o.is_success()).count();
    let failed = outcomes.len() - passed;
    let leaked = outcomes
        .iter()
        .filter(|o| o.teardown.attempted && !o.teardown.succeeded)
        .count();

    if failed == 0 {
        println!("{}", format!("✓ {}件すべて成功", passed).green().bold());
    } else {
        println!(
            "{}",
            format!("✗ {}件成功, {}件失敗", passed, failed).red().bold()
        );
    }

    if leaked > 0 {
        eprintln!(
            "{}",
            format!(
                "⚠ {}件のスイートで destroy に失敗しました。手動での削除が必要な可能性があります",
                leaked
            )
            .yellow()
        );
    }
}
