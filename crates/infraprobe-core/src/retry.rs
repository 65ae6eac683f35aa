//! プロビジョニング操作のリトライポリシー
//!
//! プロビジョニングツールは時間が経てば解消する理由でよく失敗します
//! (プロバイダのダウンロードのタイムアウト、API のスロットリング、作成直後のリソースが見えない等)。
//! 既知の一時エラーに一致するメッセージは指数バックオフでリトライし、
//! それ以外は即座に致命的エラーとします。

use rand::Rng;
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_TIME_BETWEEN_RETRIES: Duration = Duration::from_secs(5);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// 既知の一時エラー: (パターン, 理由)
const DEFAULT_RETRYABLE_ERRORS: &[(&str, &str)] = &[
    (
        ".*read: connection reset by peer.*",
        "Connection reset while downloading modules or providers",
    ),
    (
        ".*unable to verify signature.*",
        "Failed to retrieve plugin due to transient network error",
    ),
    (
        ".*unable to verify checksum.*",
        "Failed to retrieve plugin due to transient network error",
    ),
    (
        ".*no provider exists with the given name.*",
        "Failed to retrieve plugin due to transient network error",
    ),
    (
        ".*registry service is unreachable.*",
        "Failed to retrieve plugin due to transient network error",
    ),
    (
        ".*Error installing provider.*",
        "Failed to retrieve plugin due to transient network error",
    ),
    (
        ".*Failed to query available provider packages.*",
        "Failed to retrieve plugin due to transient network error",
    ),
    (
        ".*could not query provider registry for.*",
        "Failed to retrieve plugin due to transient network error",
    ),
    (
        ".*timeout while waiting for plugin to start.*",
        "Plugin start timed out",
    ),
    (
        ".*timed out waiting for server handshake.*",
        "Plugin handshake timed out",
    ),
    (".*TLS handshake timeout.*", "Transient network error"),
    (
        ".*Client\\.Timeout exceeded while awaiting headers.*",
        "Transient network error",
    ),
    (
        "(?i).*(throttling|rate exceeded|too many requests|requestlimitexceeded).*",
        "API rate limiting",
    ),
    (
        ".*Provider produced inconsistent result after apply.*",
        "Provider eventual consistency lag",
    ),
    (
        "(?i).*(operation.*already in progress|conflictingoperationinprogress|operationabortedexception).*",
        "Another operation on the resource is in progress",
    ),
];

/// リトライ対象のエラーパターンと、一時的とみなす理由
#[derive(Debug, Clone)]
pub struct RetryableError {
    pattern: Regex,
    reason: String,
}

impl RetryableError {
    pub fn new(pattern: &str, reason: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            reason: reason.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn matches(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }
}

/// 組み込みの一時エラー一覧
pub fn default_retryable_errors() -> Vec<RetryableError> {
    DEFAULT_RETRYABLE_ERRORS
        .iter()
        .filter_map(|(pattern, reason)| RetryableError::new(pattern, *reason).ok())
        .collect()
}

/// 失敗の分類結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// リトライで解消する見込み
    Transient { reason: String },
    /// リトライしても解消しない
    Fatal,
}

/// エラーメッセージが一時的な失敗かどうかを判定
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, message: &str) -> Classification;
}

/// 正規表現パターンによる判定 (最初に一致したものを採用)
#[derive(Debug, Clone, Default)]
pub struct PatternClassifier {
    errors: Vec<RetryableError>,
}

impl PatternClassifier {
    pub fn new(errors: Vec<RetryableError>) -> Self {
        Self { errors }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_retryable_errors())
    }

    pub fn errors(&self) -> &[RetryableError] {
        &self.errors
    }
}

impl ErrorClassifier for PatternClassifier {
    fn classify(&self, message: &str) -> Classification {
        self.errors
            .iter()
            .find(|e| e.matches(message))
            .map(|e| Classification::Transient {
                reason: e.reason.clone(),
            })
            .unwrap_or(Classification::Fatal)
    }
}

/// 操作の試行回数と試行間の待ち時間
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 許可する試行回数の合計 (操作は最低1回実行される)
    pub max_retries: u32,

    /// 最初の失敗後の待ち時間
    pub time_between_retries: Duration,

    /// 1回の待ち時間の上限
    pub max_delay: Duration,

    /// 待ち時間の増加率
    pub multiplier: f64,

    /// 待ち時間を ±25% ばらつかせ、並列実行のリトライ時期をずらす
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            time_between_retries: DEFAULT_TIME_BETWEEN_RETRIES,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// リトライしないポリシー
    pub fn no_retry() -> Self {
        Self {
            max_retries: 1,
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// `attempt` 回目 (0始まり) の失敗の後、次の試行までの待ち時間
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.time_between_retries.as_millis() as f64;
        let delay_ms = (base_ms * self.multiplier.max(1.0).powi(attempt as i32)) as u64;
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as u64);

        let delay_ms = if self.jitter && delay_ms > 0 {
            let jitter_range = delay_ms / 4;
            let offset = rand::thread_rng().gen_range(0..=2 * jitter_range);
            delay_ms.saturating_add(offset).saturating_sub(jitter_range)
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms)
    }
}

/// 成功した操作の結果と試行回数
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// 最終的に失敗した操作
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// 最後の1回を含む試行回数
    pub attempts: u32,

    /// リトライ回数を使い切った場合の一時エラーの理由
    pub exhausted: Option<String>,

    /// 最後のエラー
    pub error: E,
}

impl<E: fmt::Display> fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.exhausted {
            Some(reason) => write!(
                f,
                "gave up after {} attempts ({}): {}",
                self.attempts, reason, self.error
            ),
            None => write!(f, "{}", self.error),
        }
    }
}

impl<E> std::error::Error for RetryFailure<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// `operation` を実行し、一時的な失敗は `policy` に従ってリトライする
///
/// 一時的でないエラーはその場で返します。全ての試行が一時エラーで失敗した場合は、
/// 最後のエラーを `exhausted` 付きで返します。
pub async fn with_retries<T, E, F, Fut>(
    description: &str,
    policy: &RetryPolicy,
    classifier: &dyn ErrorClassifier,
    mut operation: F,
) -> Result<Retried<T>, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match operation().await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) => e,
        };

        let reason = match classifier.classify(&error.to_string()) {
            Classification::Transient { reason } => reason,
            Classification::Fatal => {
                return Err(RetryFailure {
                    attempts: attempt,
                    exhausted: None,
                    error,
                });
            }
        };

        if attempt >= max_attempts {
            warn!(
                operation = description,
                attempts = attempt,
                reason = %reason,
                "Retries exhausted"
            );
            return Err(RetryFailure {
                attempts: attempt,
                exhausted: Some(reason),
                error,
            });
        }

        let delay = policy.delay_for_attempt(attempt - 1);
        warn!(
            operation = description,
            attempt,
            max_attempts,
            reason = %reason,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, retrying: {}",
            error
        );
        tokio::time::sleep(delay).await;
    }
}
