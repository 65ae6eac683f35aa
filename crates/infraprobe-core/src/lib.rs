//! infraprobe core
//!
//! プロビジョニングテストのライフサイクルエンジン。
//! 設定を apply し、出力を検証し、作成したものは必ず destroy します。
//!
//! ```text
//! NotStarted → Applying → Applied → Validating → Destroying → Destroyed
//!                  │                                   │
//!                  └──→ Failed ──→ Destroying ─────────┴──→ Failed
//! ```

pub mod error;
pub mod lifecycle;
pub mod options;
pub mod outcome;
pub mod parser;
pub mod retry;
pub mod runner;
pub mod suite;
pub mod validate;

// 再エクスポート
pub use error::{ProbeError, Result};
pub use lifecycle::LifecycleController;
pub use options::RunOptions;
pub use outcome::{ErrorKind, Phase, RunFailure, RunOutcome, RunState, RunStatus, TeardownStatus};
pub use parser::{parse_suite_file, parse_suite_string};
pub use retry::{
    Classification, ErrorClassifier, PatternClassifier, RetryPolicy, RetryableError,
    default_retryable_errors, with_retries,
};
pub use runner::{Schedule, run_suites};
pub use suite::{Suite, SuiteFile};
pub use validate::{
    Assertion, Check, CheckOutcome, Output, ValidationFailure, ValidationOutcome, extract,
    validate_all,
};

pub use infraprobe_provision::{ConfigRef, OutputValue, ProvisioningResult, Provisioner};
