//! retry ブロックの解析

use super::{first_string, property, required_bool, required_count, required_number, required_seconds};
use crate::error::{ProbeError, Result};
use crate::retry::{RetryPolicy, RetryableError, default_retryable_errors};
use kdl::KdlNode;

const CUSTOM_REASON: &str = "Matched a suite-defined retryable error";

/// `retry` ブロックをリトライポリシーとリトライ対象エラーに変換
///
/// `defaults #false` を指定しない限り組み込みの一時エラーを含めます。
/// スイート定義の `error` パターンは常にその後ろに追加されます。
pub fn parse_retry(node: &KdlNode) -> Result<(RetryPolicy, Vec<RetryableError>)> {
    let mut policy = RetryPolicy::default();
    let mut include_defaults = true;
    let mut custom = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "max-retries" => policy.max_retries = required_count(child)?,
                "time-between-retries" => policy.time_between_retries = required_seconds(child)?,
                "max-delay" => policy.max_delay = required_seconds(child)?,
                "multiplier" => {
                    let multiplier = required_number(child)?;
                    if multiplier < 1.0 {
                        return Err(ProbeError::InvalidConfig(
                            "retry multiplier must be at least 1.0".to_string(),
                        ));
                    }
                    policy.multiplier = multiplier;
                }
                "jitter" => policy.jitter = required_bool(child)?,
                "defaults" => include_defaults = required_bool(child)?,
                "error" => {
                    let pattern = first_string(child).ok_or_else(|| {
                        ProbeError::InvalidConfig("retry error requires a pattern".to_string())
                    })?;
                    let reason = property(child, "reason")
                        .and_then(|v| v.as_string())
                        .unwrap_or(CUSTOM_REASON);
                    custom.push(RetryableError::new(pattern, reason)?);
                }
                other => {
                    return Err(ProbeError::InvalidConfig(format!(
                        "unknown retry setting '{}'",
                        other
                    )));
                }
            }
        }
    }

    let mut errors = if include_defaults {
        default_retryable_errors()
    } else {
        Vec::new()
    };
    errors.extend(custom);

    Ok((policy, errors))
}
