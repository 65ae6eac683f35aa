//! 複数スイートの実行

use crate::error::{ProbeError, Result};
use crate::lifecycle::LifecycleController;
use crate::outcome::RunOutcome;
use crate::suite::Suite;
use futures_util::future::join_all;
use infraprobe_provision::ConfigRef;
use std::collections::HashMap;
use tracing::info;

/// スイートの実行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// 全スイートを同時に実行
    #[default]
    Concurrent,
    /// 指定順に1つずつ実行
    Sequential,
}

/// 各スイートをそれぞれのライフサイクルで実行
///
/// 同じ設定を対象にするスイートは state を奪い合うため、
/// 何もプロビジョニングする前に選択全体をエラーにします。
/// 結果は渡されたスイートの順に返します。
pub async fn run_suites(
    controller: &LifecycleController,
    suites: &[&Suite],
    schedule: Schedule,
) -> Result<Vec<RunOutcome>> {
    check_distinct_configs(suites)?;

    info!(count = suites.len(), ?schedule, "Running suites");

    let outcomes = match schedule {
        Schedule::Concurrent => join_all(suites.iter().map(|suite| run_one(controller, suite))).await,
        Schedule::Sequential => {
            let mut outcomes = Vec::with_capacity(suites.len());
            for suite in suites {
                outcomes.push(run_one(controller, suite).await);
            }
            outcomes
        }
    };

    Ok(outcomes)
}

async fn run_one(controller: &LifecycleController, suite: &Suite) -> RunOutcome {
    controller
        .run_assertions(&suite.name, &suite.config, &suite.options, &suite.assertions)
        .await
}

fn check_distinct_configs(suites: &[&Suite]) -> Result<()> {
    let mut owners: HashMap<&ConfigRef, &str> = HashMap::new();

    for suite in suites {
        if let Some(first) = owners.insert(&suite.config, &suite.name) {
            return Err(ProbeError::SharedConfig {
                first: first.to_string(),
                second: suite.name.clone(),
                config: suite.config.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RunOptions;
    use crate::validate::Assertion;
    use infraprobe_provision::fakes::ScriptedProvisioner;
    use infraprobe_provision::{OutputValue, ProvisioningResult};
    use std::sync::Arc;

    fn suite(name: &str, dir: &str) -> Suite {
        Suite::new(name, ConfigRef::dir(dir)).with_options(RunOptions::new().with_max_retries(1))
    }

    #[tokio::test]
    async fn test_shared_config_rejected_before_apply() {
        let fake = Arc::new(ScriptedProvisioner::new(ProvisioningResult::new()));
        let controller = LifecycleController::new(fake.clone());

        let a = suite("a", "infra");
        let b = suite("b", "infra");

        let err = run_suites(&controller, &[&a, &b], Schedule::Concurrent)
            .await
            .unwrap_err();

        assert!(matches!(err, ProbeError::SharedConfig { ref first, ref second, .. } if first == "a" && second == "b"));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_outcomes_keep_suite_order() {
        let outputs = ProvisioningResult::new().with_output("name", OutputValue::string("x"));
        let fake = Arc::new(ScriptedProvisioner::new(outputs));
        let controller = LifecycleController::new(fake.clone());

        let a = suite("a", "infra/a").expect(Assertion::equals("name", "x"));
        let b = suite("b", "infra/b").expect(Assertion::equals("name", "y"));

        for schedule in [Schedule::Concurrent, Schedule::Sequential] {
            let outcomes = run_suites(&controller, &[&a, &b], schedule).await.unwrap();
            assert_eq!(outcomes.len(), 2);
            assert_eq!(outcomes[0].name, "a");
            assert!(outcomes[0].is_success());
            assert_eq!(outcomes[1].name, "b");
            assert!(!outcomes[1].is_success());
        }

        assert_eq!(fake.apply_calls(), 4);
        assert_eq!(fake.destroy_calls(), 4);
    }
}
