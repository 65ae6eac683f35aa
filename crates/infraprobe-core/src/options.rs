//! 実行ごとのオプション

use crate::retry::{PatternClassifier, RetryPolicy, RetryableError, default_retryable_errors};
use infraprobe_provision::ProvisionOptions;
use std::time::Duration;

/// 1回のプロビジョニングテスト実行のオプション
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// プロビジョナーにそのまま渡す (reconfigure, vars, env など)
    pub provision: ProvisionOptions,

    /// apply/destroy の試行回数とバックオフ
    pub retry: RetryPolicy,

    /// 一時的とみなすエラー
    pub retryable_errors: Vec<RetryableError>,

    /// apply + validate の制限時間。teardown はこれで打ち切られない
    pub run_timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            provision: ProvisionOptions::default(),
            retry: RetryPolicy::default(),
            retryable_errors: default_retryable_errors(),
            run_timeout: None,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reconfigure(mut self, reconfigure: bool) -> Self {
        self.provision.reconfigure = reconfigure;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, time_between_retries: Duration) -> Self {
        self.retry.time_between_retries = time_between_retries;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// 組み込みの一時エラー判定を使わない
    pub fn without_default_errors(mut self) -> Self {
        self.retryable_errors.clear();
        self
    }

    pub fn with_retryable_error(
        mut self,
        pattern: &str,
        reason: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        self.retryable_errors
            .push(RetryableError::new(pattern, reason)?);
        Ok(self)
    }

    pub fn reconfigure(&self) -> bool {
        self.provision.reconfigure
    }

    pub fn classifier(&self) -> PatternClassifier {
        PatternClassifier::new(self.retryable_errors.clone())
    }
}
