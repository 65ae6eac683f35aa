//! Provisioning adapter error types

use thiserror::Error;

/// Errors raised by a provisioning adapter.
///
/// The lifecycle engine treats these as opaque: it only looks at the rendered
/// message when deciding whether a failure is worth retrying.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("{binary} not found. Please install it or set PROBE_TERRAFORM_BINARY")]
    BinaryNotFound { binary: String },

    #[error("`{command}` failed (exit code {code}): {output}")]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read outputs: {0}")]
    OutputParse(String),

    #[error("Provisioning failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
