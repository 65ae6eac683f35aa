//! End-to-end runs against a fake terraform CLI
#![cfg(unix)]
#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

mod common;

use assert_cmd::Command;
use common::{TestProject, budget_suite};
use predicates::prelude::*;

fn probe(project: &TestProject) -> Command {
    let terraform = project.install_fake_terraform();
    let mut cmd = Command::cargo_bin("probe").unwrap();
    cmd.current_dir(project.path())
        .env("PROBE_TERRAFORM_BINARY", terraform)
        .env("NO_COLOR", "1")
        .env_remove("PROBE_CONFIG_PATH")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_run_success() {
    let project = TestProject::new();
    project.write_probe_kdl(&budget_suite("Lerato.Taunyane@bbd.co.za"));

    probe(&project)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ budget-notifications"))
        .stdout(predicate::str::contains("teardown: ok"))
        .stdout(predicate::str::contains("1件すべて成功"));

    assert_eq!(
        project.terraform_calls(),
        vec!["init", "apply", "output", "destroy"]
    );
}

#[test]
fn test_run_validation_failure_still_destroys() {
    let project = TestProject::new();
    project.write_probe_kdl(&budget_suite("nonexistent@example.com"));

    probe(&project)
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains("validation failure"))
        .stdout(predicate::str::contains("nonexistent@example.com"))
        .stdout(predicate::str::contains("teardown: ok"));

    assert_eq!(project.terraform_calls().last().map(String::as_str), Some("destroy"));
}

#[test]
fn test_run_apply_failure_still_destroys() {
    let project = TestProject::new();
    project.write_probe_kdl(&budget_suite("ops@example.com"));
    project.fail_apply();

    probe(&project)
        .arg("run")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("provisioning failure"))
        .stdout(predicate::str::contains("AccessDeniedException"));

    assert_eq!(
        project.terraform_calls(),
        vec!["init", "apply", "destroy"]
    );
}

#[test]
fn test_run_json_report() {
    let project = TestProject::new();
    project.write_probe_kdl(&budget_suite("ops@example.com"));

    let output = probe(&project).args(["run", "--json"]).output().unwrap();
    assert!(output.status.success());

    let outcomes: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let outcome = &outcomes[0];
    assert_eq!(outcome["name"], "budget-notifications");
    assert_eq!(outcome["status"], "success");
    assert_eq!(outcome["final_state"], "destroyed");
    assert_eq!(outcome["teardown"]["succeeded"], true);
    assert!(
        outcome["validation"]["checks"][0]["description"]
            .as_str()
            .unwrap()
            .contains("budget_notification_emails")
    );
}

#[test]
fn test_run_unknown_suite() {
    let project = TestProject::new();
    project.write_probe_kdl(&budget_suite("ops@example.com"));

    probe(&project)
        .args(["run", "network"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("スイートが見つかりません: network"));

    assert!(project.terraform_calls().is_empty());
}

#[test]
fn test_run_with_explicit_file() {
    let project = TestProject::new();
    let suites_dir = project.path().join("suites");
    std::fs::create_dir_all(&suites_dir).unwrap();
    std::fs::write(
        suites_dir.join("budget.kdl"),
        budget_suite("ops@example.com").replace("dir \"infra\"", "dir \"../infra\""),
    )
    .unwrap();

    probe(&project)
        .args(["run", "--file", "suites/budget.kdl"])
        .assert()
        .success();

    assert_eq!(project.terraform_calls().len(), 4);
}

#[test]
fn test_validate_lists_suites() {
    let project = TestProject::new();
    project.write_probe_kdl(&budget_suite("ops@example.com"));

    probe(&project)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("スイートファイルは正常です"))
        .stdout(predicate::str::contains("budget-notifications"))
        .stdout(predicate::str::contains(
            "budget_notification_emails contains \"ops@example.com\"",
        ));

    assert!(project.terraform_calls().is_empty());
}

#[test]
fn test_validate_reports_errors() {
    let project = TestProject::new();
    project.write_probe_kdl(r#"suite "broken" { reconfigure #true; }"#);

    probe(&project)
        .arg("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("設定エラー"))
        .stderr(predicate::str::contains("dir or module is required"));
}
