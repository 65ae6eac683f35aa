//! Provisioner trait definition

use crate::error::Result;
use crate::outputs::ProvisioningResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Provisioning adapter abstraction
///
/// The lifecycle engine only ever calls these two operations. Both may take
/// minutes against real infrastructure, and both may fail transiently.
/// `destroy` must be safe to call after a partial or failed `apply`.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Adapter name used in logs (e.g., "terraform")
    fn name(&self) -> &str;

    /// Create or update the infrastructure and return its outputs
    async fn apply(&self, config: &ConfigRef, options: &ProvisionOptions)
    -> Result<ProvisioningResult>;

    /// Tear down everything `apply` may have created
    async fn destroy(&self, config: &ConfigRef, options: &ProvisionOptions) -> Result<()>;
}

/// Identifies the declarative configuration to provision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigRef {
    /// A directory containing the configuration
    Dir(PathBuf),
    /// A module source address (registry, git, http, ...)
    Module(String),
}

impl ConfigRef {
    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self::Dir(path.into())
    }

    pub fn module(source: impl Into<String>) -> Self {
        Self::Module(source.into())
    }
}

impl fmt::Display for ConfigRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigRef::Dir(path) => write!(f, "{}", path.display()),
            ConfigRef::Module(source) => write!(f, "module {}", source),
        }
    }
}

/// Options passed through to the provisioning tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionOptions {
    /// Force re-initialization of the backend/state configuration
    pub reconfigure: bool,

    /// Input variables (`-var name=value`)
    pub vars: BTreeMap<String, String>,

    /// Variable files (`-var-file path`)
    pub var_files: Vec<PathBuf>,

    /// Extra environment for the tool process (credentials, region, ...)
    pub env: BTreeMap<String, String>,

    /// Hold the state lock during apply/destroy
    pub lock: bool,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            reconfigure: false,
            vars: BTreeMap::new(),
            var_files: Vec::new(),
            env: BTreeMap::new(),
            lock: false,
        }
    }
}

impl ProvisionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconfigure(mut self, reconfigure: bool) -> Self {
        self.reconfigure = reconfigure;
        self
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_ref_display() {
        assert_eq!(ConfigRef::dir("../").to_string(), "../");
        assert_eq!(
            ConfigRef::module("git::https://example.com/budget.git").to_string(),
            "module git::https://example.com/budget.git"
        );
    }

    #[test]
    fn test_options_builder() {
        let options = ProvisionOptions::new()
            .reconfigure(true)
            .var("environment", "test")
            .env("AWS_REGION", "af-south-1");

        assert!(options.reconfigure);
        assert!(!options.lock);
        assert_eq!(options.vars.get("environment"), Some(&"test".to_string()));
        assert_eq!(
            options.env.get("AWS_REGION"),
            Some(&"af-south-1".to_string())
        );
    }
}
