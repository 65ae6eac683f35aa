//! expect ノードの解析

use super::first_string;
use crate::error::{ProbeError, Result};
use crate::validate::Assertion;
use kdl::KdlNode;

/// `expect` ノードをプロパティごとのアサーションに変換
///
/// ```kdl
/// expect "budget_notification_emails" contains="ops@example.com"
/// expect "account_id"
/// ```
///
/// `expect "name"` だけの場合は、出力が存在し空でないことを確認します。
pub fn parse_expect(node: &KdlNode) -> Result<Vec<Assertion>> {
    let output = first_string(node)
        .ok_or_else(|| ProbeError::InvalidConfig("expect requires an output name".to_string()))?;

    let mut assertions = Vec::new();

    for entry in node.entries() {
        let Some(key) = entry.name().map(|n| n.value()) else {
            continue;
        };
        let value = entry.value();

        let text = || {
            value.as_string().ok_or_else(|| {
                ProbeError::InvalidConfig(format!(
                    "expect '{}': {} requires a string",
                    output, key
                ))
            })
        };

        let assertion = match key {
            "contains" => Assertion::contains(output, text()?),
            "equals" => Assertion::equals(output, text()?),
            "matches" => Assertion::matches(output, text()?)?,
            "present" => match value.as_bool() {
                Some(true) => Assertion::present(output),
                _ => {
                    return Err(ProbeError::InvalidConfig(format!(
                        "expect '{}': present only accepts #true",
                        output
                    )));
                }
            },
            other => {
                return Err(ProbeError::InvalidConfig(format!(
                    "expect '{}': unknown check '{}'",
                    output, other
                )));
            }
        };
        assertions.push(assertion);
    }

    if assertions.is_empty() {
        assertions.push(Assertion::not_empty(output));
    }

    Ok(assertions)
}
