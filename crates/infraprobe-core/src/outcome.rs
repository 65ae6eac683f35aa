//! 実行状態と実行結果

use crate::validate::ValidationOutcome;
use chrono::{DateTime, Utc};
use infraprobe_provision::ConfigRef;
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;

/// 実行のライフサイクル状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Applying,
    Applied,
    Validating,
    Destroying,
    Destroyed,
    Failed,
}

impl RunState {
    /// `self` の次に `next` へ遷移できるか
    ///
    /// `NotStarted` を出た経路は必ず一度だけ `Destroying` を通る。
    /// teardown 前の `Failed` からは `Destroying` にしか進めない。
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (NotStarted, Applying)
                | (Applying, Applied)
                | (Applying, Failed)
                | (Applying, Destroying)
                | (Applied, Validating)
                | (Applied, Destroying)
                | (Validating, Destroying)
                | (Failed, Destroying)
                | (Destroying, Destroyed)
                | (Destroying, Failed)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::NotStarted => "not started",
            RunState::Applying => "applying",
            RunState::Applied => "applied",
            RunState::Validating => "validating",
            RunState::Destroying => "destroying",
            RunState::Destroyed => "destroyed",
            RunState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// 失敗が起きたフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Apply,
    Validate,
    Destroy,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Apply => write!(f, "apply"),
            Phase::Validate => write!(f, "validate"),
            Phase::Destroy => write!(f, "destroy"),
        }
    }
}

/// 実行結果に現れる失敗の種類
///
/// 一時的なプロビジョニングエラーはリトライで吸収され、
/// 致命的になった時点で初めてここに現れます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FatalProvisioningError,
    ValidationFailure,
    TeardownError,
    Cancelled,
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::FatalProvisioningError => "fatal provisioning error",
            ErrorKind::ValidationFailure => "validation failure",
            ErrorKind::TeardownError => "teardown error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Timeout => "run timeout",
        };
        write!(f, "{}", s)
    }
}

/// 報告される1件の失敗
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub phase: Phase,
    pub kind: ErrorKind,
    pub message: String,
}

/// 全体の判定 (主要な失敗から決まる)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    ValidationFailure,
    ProvisioningFailure,
    TeardownFailure,
    Cancelled,
    TimedOut,
}

impl RunStatus {
    fn from_kind(kind: Option<ErrorKind>) -> Self {
        match kind {
            None => RunStatus::Success,
            Some(ErrorKind::FatalProvisioningError) => RunStatus::ProvisioningFailure,
            Some(ErrorKind::ValidationFailure) => RunStatus::ValidationFailure,
            Some(ErrorKind::TeardownError) => RunStatus::TeardownFailure,
            Some(ErrorKind::Cancelled) => RunStatus::Cancelled,
            Some(ErrorKind::Timeout) => RunStatus::TimedOut,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::ValidationFailure => "validation failure",
            RunStatus::ProvisioningFailure => "provisioning failure",
            RunStatus::TeardownFailure => "teardown failure",
            RunStatus::Cancelled => "cancelled",
            RunStatus::TimedOut => "timed out",
        };
        write!(f, "{}", s)
    }
}

/// teardown の結果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeardownStatus {
    pub attempted: bool,
    pub succeeded: bool,
    pub attempts: u32,
    pub error: Option<String>,
}

/// 1回の実行の構造化された結果
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// スイート名 (または呼び出し側が決めたラベル)
    pub name: String,
    pub config: ConfigRef,
    pub status: RunStatus,
    pub final_state: RunState,

    /// 観測した全ての失敗 (主要な原因が先頭)
    pub failures: Vec<RunFailure>,

    /// 検証を実行した場合のみ
    pub validation: Option<ValidationOutcome>,
    pub teardown: TeardownStatus,
    pub apply_attempts: u32,

    /// 遷移した順の状態
    pub transitions: Vec<RunState>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunOutcome {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        config: ConfigRef,
        mut failures: Vec<RunFailure>,
        validation: Option<ValidationOutcome>,
        teardown: TeardownStatus,
        apply_attempts: u32,
        transitions: Vec<RunState>,
        started_at: DateTime<Utc>,
    ) -> Self {
        // 検証失敗はその後に報告されたものより優先
        failures.sort_by_key(|f| priority(f.kind));

        let status = RunStatus::from_kind(failures.first().map(|f| f.kind));
        let final_state = transitions.last().copied().unwrap_or(RunState::NotStarted);
        let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;

        Self {
            name,
            config,
            status,
            final_state,
            failures,
            validation,
            teardown,
            apply_attempts,
            transitions,
            started_at,
            duration_ms,
        }
    }

    /// apply + validate + destroy が全て成功
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn primary_failure(&self) -> Option<&RunFailure> {
        self.failures.first()
    }

    /// 実行のテキストレポート
    pub fn report(&self) -> String {
        let mut out = String::new();
        let seconds = self.duration_ms as f64 / 1000.0;

        match self.primary_failure() {
            None => {
                let _ = writeln!(out, "✓ {} ({}) passed in {:.1}s", self.name, self.config, seconds);
            }
            Some(primary) => {
                let _ = writeln!(
                    out,
                    "✗ {} ({}) FAILED in {:.1}s: {}",
                    self.name, self.config, seconds, self.status
                );
                let _ = writeln!(out, "  phase: {}", primary.phase);
                let _ = writeln!(out, "  cause: {}", primary.message);
            }
        }

        let attempts = if self.apply_attempts == 1 { "attempt" } else { "attempts" };
        let _ = writeln!(out, "  apply: {} {}", self.apply_attempts, attempts);

        if let Some(validation) = &self.validation {
            let _ = writeln!(
                out,
                "  checks: {}/{} passed",
                validation.passed_count(),
                validation.checks.len()
            );
            for check in &validation.checks {
                match &check.failure {
                    None => {
                        let _ = writeln!(out, "    ✓ {}", check.description);
                    }
                    Some(failure) => {
                        let _ = writeln!(out, "    ✗ {}", check.description);
                        let _ = writeln!(out, "        {}", failure);
                    }
                }
            }
        }

        let teardown = match (self.teardown.attempted, &self.teardown.error) {
            (false, _) => "not attempted".to_string(),
            (true, None) => "ok".to_string(),
            (true, Some(error)) => format!("FAILED: {}", error),
        };
        let _ = writeln!(out, "  teardown: {}", teardown);

        for secondary in self.failures.iter().skip(1) {
            let _ = writeln!(
                out,
                "  also: {} during {}: {}",
                secondary.kind, secondary.phase, secondary.message
            );
        }

        out
    }
}

fn priority(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::ValidationFailure => 0,
        ErrorKind::FatalProvisioningError => 1,
        ErrorKind::Cancelled => 2,
        ErrorKind::Timeout => 3,
        ErrorKind::TeardownError => 4,
    }
}
