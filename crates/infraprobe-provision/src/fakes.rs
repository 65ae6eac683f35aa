//! In-memory fake provisioner (testing only)
//!
//! `ScriptedProvisioner` replays a scripted sequence of apply/destroy results
//! and records every call, so lifecycle properties can be checked without
//! touching real infrastructure.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ProvisionError, Result};
use crate::outputs::ProvisioningResult;
use crate::provider::{ConfigRef, ProvisionOptions, Provisioner};

/// A call observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionCall {
    Apply(ConfigRef),
    Destroy(ConfigRef),
}

/// Provisioner that answers from a script.
///
/// Apply calls pop the next scripted answer; once the script is exhausted
/// they succeed with the configured outputs. Destroy behaves the same way and
/// succeeds by default.
#[derive(Debug, Default)]
pub struct ScriptedProvisioner {
    outputs: ProvisioningResult,
    apply_script: Mutex<VecDeque<std::result::Result<(), String>>>,
    destroy_script: Mutex<VecDeque<std::result::Result<(), String>>>,
    apply_delay: Option<Duration>,
    calls: Mutex<Vec<ProvisionCall>>,
}

impl ScriptedProvisioner {
    pub fn new(outputs: ProvisioningResult) -> Self {
        Self {
            outputs,
            ..Default::default()
        }
    }

    /// Queue a failing apply with the given error message
    pub fn fail_apply(self, message: impl Into<String>) -> Self {
        lock(&self.apply_script).push_back(Err(message.into()));
        self
    }

    /// Queue `count` failing applies with the same message
    pub fn fail_apply_times(self, count: usize, message: &str) -> Self {
        (0..count).fold(self, |fake, _| fake.fail_apply(message))
    }

    /// Queue a failing destroy with the given error message
    pub fn fail_destroy(self, message: impl Into<String>) -> Self {
        lock(&self.destroy_script).push_back(Err(message.into()));
        self
    }

    /// Make every apply take this long before answering
    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ProvisionCall> {
        lock(&self.calls).clone()
    }

    pub fn apply_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProvisionCall::Apply(_)))
            .count()
    }

    pub fn destroy_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProvisionCall::Destroy(_)))
            .count()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Provisioner for ScriptedProvisioner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn apply(
        &self,
        config: &ConfigRef,
        _options: &ProvisionOptions,
    ) -> Result<ProvisioningResult> {
        lock(&self.calls).push(ProvisionCall::Apply(config.clone()));

        if let Some(delay) = self.apply_delay {
            tokio::time::sleep(delay).await;
        }

        let next = lock(&self.apply_script).pop_front();
        match next {
            Some(Err(message)) => Err(ProvisionError::Failed(message)),
            Some(Ok(())) | None => Ok(self.outputs.clone()),
        }
    }

    async fn destroy(&self, config: &ConfigRef, _options: &ProvisionOptions) -> Result<()> {
        lock(&self.calls).push(ProvisionCall::Destroy(config.clone()));

        let next = lock(&self.destroy_script).pop_front();
        match next {
            Some(Err(message)) => Err(ProvisionError::Failed(message)),
            Some(Ok(())) | None => Ok(()),
        }
    }
}
