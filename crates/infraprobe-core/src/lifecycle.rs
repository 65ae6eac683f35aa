//! ライフサイクル制御: apply → validate → destroy
//!
//! apply を開始した実行は、検証失敗・検証クロージャ内の panic・apply の致命的エラー・
//! キャンセル・実行タイムアウトのどの経路でも、destroy をちょうど1回試みて終わります。
//! apply 前にキャンセルされた実行は何も操作しません。

use crate::options::RunOptions;
use crate::outcome::{ErrorKind, Phase, RunFailure, RunOutcome, RunState, TeardownStatus};
use crate::retry::{PatternClassifier, with_retries};
use crate::validate::{Assertion, ValidationOutcome, validate_all};
use chrono::{DateTime, Utc};
use infraprobe_provision::{ConfigRef, ProvisioningResult, Provisioner};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 1つのプロビジョナーに対するプロビジョニングテスト実行を制御する
///
/// 実行同士が共有するのはプロビジョナーとキャンセルトークンだけなので、
/// 異なる設定に対する複数の実行を1つのコントローラーから並行に動かせます。
pub struct LifecycleController {
    provisioner: Arc<dyn Provisioner>,
    cancel: CancellationToken,
}

impl LifecycleController {
    pub fn new(provisioner: Arc<dyn Provisioner>) -> Self {
        Self {
            provisioner,
            cancel: CancellationToken::new(),
        }
    }

    /// 外部のキャンセルトークンを共有 (Ctrl-C など)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// ライフサイクルを1回実行 (ラベルは設定参照)
    pub async fn run<F>(&self, config: &ConfigRef, options: &RunOptions, validate: F) -> RunOutcome
    where
        F: FnOnce(&ProvisioningResult) -> ValidationOutcome,
    {
        self.run_named(&config.to_string(), config, options, validate)
            .await
    }

    /// 宣言的アサーションでライフサイクルを1回実行
    pub async fn run_assertions(
        &self,
        name: &str,
        config: &ConfigRef,
        options: &RunOptions,
        assertions: &[Assertion],
    ) -> RunOutcome {
        self.run_named(name, config, options, |result| {
            validate_all(assertions, result)
        })
        .await
    }

    /// ライフサイクルを1回実行: apply (リトライ付き)、validate、destroy
    pub async fn run_named<F>(
        &self,
        name: &str,
        config: &ConfigRef,
        options: &RunOptions,
        validate: F,
    ) -> RunOutcome
    where
        F: FnOnce(&ProvisioningResult) -> ValidationOutcome,
    {
        let started_at = Utc::now();
        let classifier = options.classifier();
        let mut record = RunRecord::default();

        info!(run = name, config = %config, provisioner = self.provisioner.name(), "Starting run");

        if self.cancel.is_cancelled() {
            return self.never_started(name, config, record, Interrupt::Cancelled, options, started_at);
        }

        // apply 前に用意する。途中まで apply されたものも削除対象
        let deployment = Deployment {
            provisioner: self.provisioner.as_ref(),
            config,
            options,
            classifier: &classifier,
            released: false,
        };

        let interrupted = {
            let phase = apply_and_validate(
                self.provisioner.as_ref(),
                name,
                config,
                options,
                &classifier,
                &mut record,
                validate,
            );
            let bounded = async {
                match options.run_timeout {
                    Some(limit) => tokio::time::timeout(limit, phase)
                        .await
                        .map_err(|_| Interrupt::Timeout),
                    None => {
                        phase.await;
                        Ok(())
                    }
                }
            };

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Some(Interrupt::Cancelled),
                finished = bounded => finished.err(),
            }
        };

        if let Some(interrupt) = interrupted {
            if record.current() == RunState::NotStarted {
                deployment.disarm();
                return self.never_started(name, config, record, interrupt, options, started_at);
            }
            let phase = match record.current() {
                RunState::NotStarted | RunState::Applying => Phase::Apply,
                _ => Phase::Validate,
            };
            warn!(run = name, phase = %phase, "Run interrupted ({}), tearing down", interrupt.kind());
            record.failures.push(RunFailure {
                phase,
                kind: interrupt.kind(),
                message: interrupt.message(options),
            });
        }

        record.enter(RunState::Destroying);
        let teardown = deployment.release().await;

        if let Some(error) = &teardown.error {
            record.failures.push(RunFailure {
                phase: Phase::Destroy,
                kind: ErrorKind::TeardownError,
                message: error.clone(),
            });
        }

        let run_failed = record.failures.iter().any(|f| {
            matches!(
                f.kind,
                ErrorKind::FatalProvisioningError | ErrorKind::Cancelled | ErrorKind::Timeout
            )
        });
        if teardown.succeeded && !run_failed {
            record.enter(RunState::Destroyed);
        } else {
            record.enter(RunState::Failed);
        }

        let outcome = RunOutcome::new(
            name.to_string(),
            config.clone(),
            record.failures,
            record.validation,
            teardown,
            record.apply_attempts.load(Ordering::SeqCst),
            record.states,
            started_at,
        );

        info!(run = name, status = %outcome.status, duration_ms = outcome.duration_ms, "Run finished");
        outcome
    }

    /// 何も apply していないので destroy もしない
    fn never_started(
        &self,
        name: &str,
        config: &ConfigRef,
        mut record: RunRecord,
        interrupt: Interrupt,
        options: &RunOptions,
        started_at: DateTime<Utc>,
    ) -> RunOutcome {
        warn!(run = name, "Run {} before apply, skipping teardown", interrupt.kind());
        record.failures.push(RunFailure {
            phase: Phase::Apply,
            kind: interrupt.kind(),
            message: format!("{} before apply started", interrupt.message(options)),
        });

        RunOutcome::new(
            name.to_string(),
            config.clone(),
            record.failures,
            None,
            TeardownStatus::default(),
            0,
            record.states,
            started_at,
        )
    }
}

/// フェーズ間で共有する実行記録
struct RunRecord {
    states: Vec<RunState>,
    failures: Vec<RunFailure>,
    validation: Option<ValidationOutcome>,
    apply_attempts: AtomicU32,
}

impl Default for RunRecord {
    fn default() -> Self {
        Self {
            states: vec![RunState::NotStarted],
            failures: Vec::new(),
            validation: None,
            apply_attempts: AtomicU32::new(0),
        }
    }
}

impl RunRecord {
    fn current(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::NotStarted)
    }

    fn enter(&mut self, next: RunState) {
        let current = self.current();
        debug_assert!(
            current.can_transition_to(next),
            "illegal transition {} -> {}",
            current,
            next
        );
        debug!(from = %current, to = %next, "State transition");
        self.states.push(next);
    }
}

/// apply/validate が途中で止まった理由
enum Interrupt {
    Cancelled,
    Timeout,
}

impl Interrupt {
    fn kind(&self) -> ErrorKind {
        match self {
            Interrupt::Cancelled => ErrorKind::Cancelled,
            Interrupt::Timeout => ErrorKind::Timeout,
        }
    }

    fn message(&self, options: &RunOptions) -> String {
        match (self, options.run_timeout) {
            (Interrupt::Timeout, Some(limit)) => {
                format!("run exceeded its timeout of {}s", limit.as_secs())
            }
            _ => "run cancelled by operator".to_string(),
        }
    }
}

async fn apply_and_validate<F>(
    provisioner: &dyn Provisioner,
    name: &str,
    config: &ConfigRef,
    options: &RunOptions,
    classifier: &PatternClassifier,
    record: &mut RunRecord,
    validate: F,
) where
    F: FnOnce(&ProvisioningResult) -> ValidationOutcome,
{
    record.enter(RunState::Applying);
    info!(run = name, "Applying");

    let applied = with_retries("apply", &options.retry, classifier, || {
        record.apply_attempts.fetch_add(1, Ordering::SeqCst);
        provisioner.apply(config, &options.provision)
    })
    .await;

    let result = match applied {
        Ok(applied) => applied.value,
        Err(failure) => {
            error!(run = name, attempts = failure.attempts, "Apply failed: {}", failure);
            record.enter(RunState::Failed);
            record.failures.push(RunFailure {
                phase: Phase::Apply,
                kind: ErrorKind::FatalProvisioningError,
                message: failure.to_string(),
            });
            return;
        }
    };

    record.enter(RunState::Applied);
    record.enter(RunState::Validating);
    info!(run = name, outputs = result.len(), "Validating");

    let validation = catch_unwind(AssertUnwindSafe(|| validate(&result)))
        .unwrap_or_else(|panic| ValidationOutcome::unexpected(panic_message(panic.as_ref())));

    if !validation.is_pass() {
        let failed = validation.failed_count();
        let first = validation
            .failures()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        let message = if failed > 1 {
            format!("{} (and {} more failed checks)", first, failed - 1)
        } else {
            first
        };
        warn!(run = name, failed, "Validation failed: {}", message);
        record.failures.push(RunFailure {
            phase: Phase::Validate,
            kind: ErrorKind::ValidationFailure,
            message,
        });
    }

    record.validation = Some(validation);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic during validation".to_string()
    }
}

/// 1回の実行の間に確保したインフラ
///
/// `release` で destroy を実行します。release せずに drop された場合は
/// リソースが残っている可能性があるため、エラーログを出します。
#[must_use = "a deployment must be released to tear infrastructure down"]
struct Deployment<'a> {
    provisioner: &'a dyn Provisioner,
    config: &'a ConfigRef,
    options: &'a RunOptions,
    classifier: &'a PatternClassifier,
    released: bool,
}

impl Deployment<'_> {
    /// apply を開始しなかった場合にガードを外す
    fn disarm(mut self) {
        self.released = true;
    }

    async fn release(mut self) -> TeardownStatus {
        self.released = true;
        info!(config = %self.config, "Destroying");

        let destroyed = with_retries("destroy", &self.options.retry, self.classifier, || {
            self.provisioner
                .destroy(self.config, &self.options.provision)
        })
        .await;

        match destroyed {
            Ok(done) => TeardownStatus {
                attempted: true,
                succeeded: true,
                attempts: done.attempts,
                error: None,
            },
            Err(failure) => {
                error!(config = %self.config, "Teardown failed, resources may be left behind: {}", failure);
                TeardownStatus {
                    attempted: true,
                    succeeded: false,
                    attempts: failure.attempts,
                    error: Some(failure.to_string()),
                }
            }
        }
    }
}

impl Drop for Deployment<'_> {
    fn drop(&mut self) {
        if !self.released {
            error!(config = %self.config, "Run dropped before teardown; resources may be left behind");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infraprobe_provision::fakes::ScriptedProvisioner;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "panic: boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bad output"));
        assert_eq!(panic_message(payload.as_ref()), "panic: bad output");

        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "panic during validation");
    }

    #[tokio::test]
    async fn test_run_label_defaults_to_config() {
        let fake = Arc::new(ScriptedProvisioner::new(ProvisioningResult::new()));
        let controller = LifecycleController::new(fake);

        let outcome = controller
            .run(&ConfigRef::dir("infra"), &RunOptions::new(), |_| {
                ValidationOutcome::new()
            })
            .await;

        assert_eq!(outcome.name, "infra");
        assert!(outcome.is_success());
    }

    #[test]
    fn test_record_transitions() {
        let mut record = RunRecord::default();
        assert_eq!(record.current(), RunState::NotStarted);
        record.enter(RunState::Applying);
        record.enter(RunState::Failed);
        record.enter(RunState::Destroying);
        assert_eq!(record.current(), RunState::Destroying);
        assert_eq!(record.states.len(), 4);
    }
}
