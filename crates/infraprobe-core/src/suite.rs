//! スイートモデル
//!
//! スイートは1つの設定と、そのプロビジョニングオプション、
//! 出力に対する期待値を束ねたものです。

use crate::error::{ProbeError, Result};
use crate::options::RunOptions;
use crate::validate::Assertion;
use infraprobe_provision::ConfigRef;
use std::path::PathBuf;

/// 1つのプロビジョニングテスト
#[derive(Debug, Clone)]
pub struct Suite {
    pub name: String,
    pub config: ConfigRef,
    pub options: RunOptions,
    pub assertions: Vec<Assertion>,
}

impl Suite {
    pub fn new(name: impl Into<String>, config: ConfigRef) -> Self {
        Self {
            name: name.into(),
            config,
            options: RunOptions::default(),
            assertions: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn expect(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }
}

/// 1ファイルに定義された全スイート (定義順)
#[derive(Debug, Clone, Default)]
pub struct SuiteFile {
    /// 読み込み元のパス (文字列から読んだ場合は None)
    pub path: Option<PathBuf>,
    pub suites: Vec<Suite>,
}

impl SuiteFile {
    pub fn get(&self, name: &str) -> Option<&Suite> {
        self.suites.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.suites.iter().map(|s| s.name.as_str())
    }

    /// 名前でスイートを選択 (空なら全スイート)
    pub fn select(&self, names: &[String]) -> Result<Vec<&Suite>> {
        if names.is_empty() {
            return Ok(self.suites.iter().collect());
        }

        names
            .iter()
            .map(|name| {
                self.get(name)
                    .ok_or_else(|| ProbeError::SuiteNotFound(name.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> SuiteFile {
        SuiteFile {
            path: None,
            suites: vec![
                Suite::new("budget", ConfigRef::dir("infra/budget")),
                Suite::new("network", ConfigRef::dir("infra/network")),
            ],
        }
    }

    #[test]
    fn test_select_all() {
        let file = file();
        let selected = file.select(&[]).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(file.names().collect::<Vec<_>>(), vec!["budget", "network"]);
    }

    #[test]
    fn test_select_by_name() {
        let file = file();
        let selected = file.select(&["network".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].config, ConfigRef::dir("infra/network"));
    }

    #[test]
    fn test_select_unknown() {
        let err = file().select(&["dns".to_string()]).unwrap_err();
        assert!(matches!(err, ProbeError::SuiteNotFound(name) if name == "dns"));
    }

    #[test]
    fn test_builder() {
        let suite = Suite::new("budget", ConfigRef::module("./modules/budget"))
            .with_options(RunOptions::new().with_max_retries(1))
            .expect(Assertion::not_empty("budget_name"));

        assert_eq!(suite.options.retry.max_retries, 1);
        assert_eq!(suite.assertions.len(), 1);
    }
}
