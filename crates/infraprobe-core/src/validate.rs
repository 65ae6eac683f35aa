//! 出力の取り出しとアサーション
//!
//! 検証は [`ProvisioningResult`] を読むだけで、変更もプロビジョナーの呼び出しもしません。
//! 失敗したチェックは真偽値ではなく構造化された [`ValidationFailure`] になり、
//! レポートにはどの出力で何を期待し実際に何だったかが残ります。

use infraprobe_provision::{OutputValue, ProvisioningResult};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// チェックが通らなかった理由
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFailure {
    #[error("output '{name}' not found (available: {available})")]
    MissingOutput { name: String, available: String },

    #[error("output '{output}' failed `{check}`: expected {expected}, got {actual}")]
    Mismatch {
        output: String,
        check: String,
        expected: String,
        actual: String,
    },

    #[error("validation aborted: {message}")]
    Unexpected { message: String },
}

impl ValidationFailure {
    /// 失敗に関係する出力名 (あれば)
    pub fn output(&self) -> Option<&str> {
        match self {
            ValidationFailure::MissingOutput { name, .. } => Some(name),
            ValidationFailure::Mismatch { output, .. } => Some(output),
            ValidationFailure::Unexpected { .. } => None,
        }
    }
}

/// 名前で出力を取り出す
///
/// 返す値は保存されている値そのものです。
pub fn extract<'a>(
    result: &'a ProvisioningResult,
    name: &'a str,
) -> Result<Output<'a>, ValidationFailure> {
    result
        .get(name)
        .map(|value| Output { name, value })
        .ok_or_else(|| ValidationFailure::MissingOutput {
            name: name.to_string(),
            available: available_outputs(result),
        })
}

fn available_outputs(result: &ProvisioningResult) -> String {
    if result.is_empty() {
        "none".to_string()
    } else {
        result.names().collect::<Vec<_>>().join(", ")
    }
}

/// プロビジョニング結果から取り出した名前付きの出力
///
/// アサーションは成功時に自身を返すので `?` でつなげられます:
/// `extract(&result, "emails")?.assert_not_empty()?.assert_contains("ops@")?`
#[derive(Debug, Clone, Copy)]
pub struct Output<'a> {
    name: &'a str,
    value: &'a OutputValue,
}

impl<'a> Output<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn value(&self) -> &'a OutputValue {
        self.value
    }

    /// 文字列は部分一致、リストは `needle` と等しい要素。
    /// それ以外は JSON 表現に対する部分一致。
    pub fn assert_contains(self, needle: &str) -> Result<Self, ValidationFailure> {
        let found = match self.value.list_items() {
            Some(items) => items.iter().any(|item| item == needle),
            None => self.value.render().contains(needle),
        };
        self.ensure(found, "contains", format!("{:?}", needle))
    }

    pub fn assert_equals(self, expected: &str) -> Result<Self, ValidationFailure> {
        let equal = self.value.render() == expected;
        self.ensure(equal, "equals", format!("{:?}", expected))
    }

    pub fn assert_matches(self, pattern: &Regex) -> Result<Self, ValidationFailure> {
        let matched = pattern.is_match(&self.value.render());
        self.ensure(matched, "matches", format!("/{}/", pattern.as_str()))
    }

    pub fn assert_not_empty(self) -> Result<Self, ValidationFailure> {
        let non_empty = !self.value.is_empty();
        self.ensure(non_empty, "not empty", "a non-empty value".to_string())
    }

    fn ensure(self, ok: bool, check: &str, expected: String) -> Result<Self, ValidationFailure> {
        if ok {
            Ok(self)
        } else {
            Err(ValidationFailure::Mismatch {
                output: self.name.to_string(),
                check: check.to_string(),
                expected,
                actual: format!("{:?}", self.value.render()),
            })
        }
    }
}

/// 1つの出力に対する宣言的なチェック
#[derive(Debug, Clone)]
pub enum Check {
    Present,
    NotEmpty,
    Contains(String),
    Equals(String),
    Matches(Regex),
}

/// スイートファイルに書かれた名前付きアサーション
#[derive(Debug, Clone)]
pub struct Assertion {
    pub output: String,
    pub check: Check,
}

impl Assertion {
    pub fn present(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            check: Check::Present,
        }
    }

    pub fn not_empty(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            check: Check::NotEmpty,
        }
    }

    pub fn contains(output: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            check: Check::Contains(needle.into()),
        }
    }

    pub fn equals(output: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            check: Check::Equals(expected.into()),
        }
    }

    pub fn matches(output: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            output: output.into(),
            check: Check::Matches(Regex::new(pattern)?),
        })
    }

    /// レポート用の1行説明
    pub fn describe(&self) -> String {
        match &self.check {
            Check::Present => format!("{} is present", self.output),
            Check::NotEmpty => format!("{} is not empty", self.output),
            Check::Contains(needle) => format!("{} contains {:?}", self.output, needle),
            Check::Equals(expected) => format!("{} equals {:?}", self.output, expected),
            Check::Matches(re) => format!("{} matches /{}/", self.output, re.as_str()),
        }
    }

    pub fn evaluate(&self, result: &ProvisioningResult) -> Result<(), ValidationFailure> {
        let output = extract(result, &self.output)?;
        match &self.check {
            Check::Present => Ok(()),
            Check::NotEmpty => output.assert_not_empty().map(drop),
            Check::Contains(needle) => output.assert_contains(needle).map(drop),
            Check::Equals(expected) => output.assert_equals(expected).map(drop),
            Check::Matches(re) => output.assert_matches(re).map(drop),
        }
    }
}

/// 1つのチェックの結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub description: String,
    pub failure: Option<ValidationFailure>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// 検証ステップで行った全チェック
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub checks: Vec<CheckOutcome>,
}

impl ValidationOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// チェックを記録して返す (ビルダー形式)
    pub fn check<T>(
        mut self,
        description: impl Into<String>,
        result: Result<T, ValidationFailure>,
    ) -> Self {
        self.record(description, result);
        self
    }

    pub fn record<T>(&mut self, description: impl Into<String>, result: Result<T, ValidationFailure>) {
        self.checks.push(CheckOutcome {
            description: description.into(),
            failure: result.err(),
        });
    }

    /// 結果を返さずに異常終了した検証ステップの結果
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new().check(
            "validation completed",
            Err::<(), _>(ValidationFailure::Unexpected {
                message: message.into(),
            }),
        )
    }

    /// 失敗したチェックがなければ true (チェック0件も成功)
    pub fn is_pass(&self) -> bool {
        self.checks.iter().all(CheckOutcome::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationFailure> {
        self.checks.iter().filter_map(|c| c.failure.as_ref())
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.len() - self.passed_count()
    }
}

/// 全アサーションを結果に対して評価
pub fn validate_all(assertions: &[Assertion], result: &ProvisioningResult) -> ValidationOutcome {
    assertions
        .iter()
        .fold(ValidationOutcome::new(), |outcome, assertion| {
            outcome.check(assertion.describe(), assertion.evaluate(result))
        })
}
