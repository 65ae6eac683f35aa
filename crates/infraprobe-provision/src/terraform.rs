//! terraform CLI wrapper
//!
//! Drives `terraform` (or a compatible binary such as `tofu`) as the
//! provisioning adapter: `init` + `apply` + `output -json` on apply, and
//! `destroy` on teardown.

use crate::error::{ProvisionError, Result};
use crate::outputs::{OutputValue, ProvisioningResult};
use crate::provider::{ConfigRef, ProvisionOptions, Provisioner};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const DEFAULT_BINARY: &str = "terraform";
const DEFAULT_MODULE_ROOT: &str = ".infraprobe/modules";

/// terraform CLI wrapper
#[derive(Debug, Clone)]
pub struct Terraform {
    binary: String,
    module_root: PathBuf,
}

impl Default for Terraform {
    fn default() -> Self {
        Self::new()
    }
}

impl Terraform {
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            module_root: PathBuf::from(DEFAULT_MODULE_ROOT),
        }
    }

    /// Use another executable (e.g. `tofu`, or an absolute path)
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Directory under which module sources are materialized
    pub fn with_module_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.module_root = root.into();
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Working directory the CLI runs in for a configuration
    pub fn working_dir(&self, config: &ConfigRef) -> PathBuf {
        match config {
            ConfigRef::Dir(path) => path.clone(),
            ConfigRef::Module(source) => self.module_root.join(module_slug(source)),
        }
    }

    /// Run a terraform command in `dir` and return stdout
    async fn run_command(
        &self,
        dir: &Path,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(dir);
        cmd.args(args);
        cmd.envs(env);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Abandoned applies (cancellation, run timeout) must not keep running.
        cmd.kill_on_drop(true);

        let command = format!("{} {}", self.binary, args.join(" "));
        tracing::debug!(dir = %dir.display(), "Running: {}", command);

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProvisionError::BinaryNotFound {
                    binary: self.binary.clone(),
                }
            } else {
                ProvisionError::Io(e)
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if !output.status.success() {
            // Retry patterns are matched against this text, so keep both streams.
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisionError::CommandFailed {
                command,
                code: output.status.code().unwrap_or(-1),
                output: format!("{}\n{}", stderr.trim(), stdout.trim())
                    .trim()
                    .to_string(),
            });
        }

        Ok(stdout)
    }

    /// `terraform init`
    pub async fn init(&self, config: &ConfigRef, options: &ProvisionOptions) -> Result<()> {
        let dir = self.working_dir(config);
        let from_module = match config {
            ConfigRef::Module(source) => {
                tokio::fs::create_dir_all(&dir).await?;
                // -from-module only works on an empty directory.
                if is_empty_dir(&dir).await? {
                    Some(source.as_str())
                } else {
                    None
                }
            }
            ConfigRef::Dir(path) => {
                if !path.is_dir() {
                    return Err(ProvisionError::InvalidConfig(format!(
                        "configuration directory not found: {}",
                        path.display()
                    )));
                }
                None
            }
        };

        self.run_command(&dir, &init_args(options, from_module), &options.env)
            .await?;
        Ok(())
    }

    /// `terraform output -json`, parsed into a provisioning result
    pub async fn outputs(
        &self,
        config: &ConfigRef,
        options: &ProvisionOptions,
    ) -> Result<ProvisioningResult> {
        let dir = self.working_dir(config);
        let args = vec![
            "output".to_string(),
            "-json".to_string(),
            "-no-color".to_string(),
        ];
        let stdout = self.run_command(&dir, &args, &options.env).await?;
        parse_outputs(&stdout)
    }
}

#[async_trait]
impl Provisioner for Terraform {
    fn name(&self) -> &str {
        &self.binary
    }

    async fn apply(
        &self,
        config: &ConfigRef,
        options: &ProvisionOptions,
    ) -> Result<ProvisioningResult> {
        self.init(config, options).await?;

        let dir = self.working_dir(config);
        self.run_command(&dir, &apply_args(options), &options.env)
            .await?;

        let result = self.outputs(config, options).await?;
        tracing::info!(config = %config, outputs = result.len(), "Apply finished");
        Ok(result)
    }

    async fn destroy(&self, config: &ConfigRef, options: &ProvisionOptions) -> Result<()> {
        let dir = self.working_dir(config);

        // Nothing can have been created before init succeeded.
        if !dir.join(".terraform").exists() {
            tracing::debug!(config = %config, "Working directory never initialized, skipping destroy");
            return Ok(());
        }

        self.run_command(&dir, &destroy_args(options), &options.env)
            .await?;
        tracing::info!(config = %config, "Destroy finished");
        Ok(())
    }
}

fn init_args(options: &ProvisionOptions, from_module: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "init".to_string(),
        "-input=false".to_string(),
        "-upgrade=false".to_string(),
        "-no-color".to_string(),
    ];

    if options.reconfigure {
        args.push("-reconfigure".to_string());
    }

    if let Some(source) = from_module {
        args.push(format!("-from-module={}", source));
    }

    args
}

fn apply_args(options: &ProvisionOptions) -> Vec<String> {
    let mut args = vec![
        "apply".to_string(),
        "-input=false".to_string(),
        "-auto-approve".to_string(),
        "-no-color".to_string(),
    ];
    args.extend(common_args(options));
    args
}

fn destroy_args(options: &ProvisionOptions) -> Vec<String> {
    let mut args = vec![
        "destroy".to_string(),
        "-input=false".to_string(),
        "-auto-approve".to_string(),
        "-no-color".to_string(),
    ];
    args.extend(common_args(options));
    args
}

/// Lock flag and variables shared by apply and destroy
fn common_args(options: &ProvisionOptions) -> Vec<String> {
    let mut args = Vec::new();

    if !options.lock {
        args.push("-lock=false".to_string());
    }

    for (name, value) in &options.vars {
        args.push("-var".to_string());
        args.push(format!("{}={}", name, value));
    }

    for file in &options.var_files {
        args.push("-var-file".to_string());
        args.push(file.display().to_string());
    }

    args
}

/// One entry of `terraform output -json`
#[derive(Debug, Deserialize)]
struct TerraformOutput {
    value: serde_json::Value,
}

/// Parse the JSON printed by `terraform output -json`
pub fn parse_outputs(json: &str) -> Result<ProvisioningResult> {
    if json.trim().is_empty() {
        return Ok(ProvisioningResult::new());
    }

    let raw: BTreeMap<String, TerraformOutput> = serde_json::from_str(json)
        .map_err(|e| ProvisionError::OutputParse(e.to_string()))?;

    Ok(raw
        .into_iter()
        .map(|(name, output)| (name, OutputValue::structured(output.value)))
        .collect())
}

fn module_slug(source: &str) -> String {
    source
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

async fn is_empty_dir(dir: &Path) -> Result<bool> {
    Ok(tokio::fs::read_dir(dir).await?.next_entry().await?.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_args_reconfigure() {
        let options = ProvisionOptions::new().reconfigure(true);
        let args = init_args(&options, None);
        assert_eq!(args[0], "init");
        assert!(args.contains(&"-reconfigure".to_string()));
        assert!(args.contains(&"-input=false".to_string()));
    }

    #[test]
    fn test_init_args_from_module() {
        let args = init_args(&ProvisionOptions::new(), Some("git::https://example.com/m.git"));
        assert!(!args.contains(&"-reconfigure".to_string()));
        assert!(args.contains(&"-from-module=git::https://example.com/m.git".to_string()));
    }

    #[test]
    fn test_apply_args_vars_and_lock() {
        let mut options = ProvisionOptions::new().var("environment", "test");
        options.var_files.push(PathBuf::from("test.tfvars"));

        let args = apply_args(&options);
        assert_eq!(args[0], "apply");
        assert!(args.contains(&"-auto-approve".to_string()));
        assert!(args.contains(&"-lock=false".to_string()));

        let var_pos = args.iter().position(|a| a == "-var").unwrap();
        assert_eq!(args[var_pos + 1], "environment=test");
        let file_pos = args.iter().position(|a| a == "-var-file").unwrap();
        assert_eq!(args[file_pos + 1], "test.tfvars");
    }

    #[test]
    fn test_destroy_args_with_lock() {
        let mut options = ProvisionOptions::new();
        options.lock = true;
        let args = destroy_args(&options);
        assert_eq!(args[0], "destroy");
        assert!(!args.iter().any(|a| a.starts_with("-lock")));
    }

    #[test]
    fn test_parse_outputs() {
        let json = r#"{
            "budget_notification_emails": {
                "sensitive": false,
                "type": "string",
                "value": "Lerato.Taunyane@bbd.co.za,ops@example.com"
            },
            "subnets": {
                "sensitive": false,
                "type": ["list", "string"],
                "value": ["subnet-a", "subnet-b"]
            }
        }"#;

        let result = parse_outputs(json).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(
            result
                .get("budget_notification_emails")
                .and_then(|v| v.as_str()),
            Some("Lerato.Taunyane@bbd.co.za,ops@example.com")
        );
        assert_eq!(
            result.get("subnets").and_then(|v| v.list_items()),
            Some(vec!["subnet-a".to_string(), "subnet-b".to_string()])
        );
    }

    #[test]
    fn test_parse_outputs_empty() {
        assert!(parse_outputs("").unwrap().is_empty());
        assert!(parse_outputs("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_outputs_invalid() {
        let result = parse_outputs("not json");
        assert!(matches!(result, Err(ProvisionError::OutputParse(_))));
    }

    #[test]
    fn test_working_dir_for_module() {
        let terraform = Terraform::new().with_module_root("/tmp/probe-modules");
        let dir = terraform.working_dir(&ConfigRef::module("git::https://example.com/m.git"));
        assert_eq!(
            dir,
            PathBuf::from("/tmp/probe-modules/git--https---example-com-m-git")
        );

        let dir = terraform.working_dir(&ConfigRef::dir("infra"));
        assert_eq!(dir, PathBuf::from("infra"));
    }

    #[tokio::test]
    async fn test_is_empty_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(is_empty_dir(temp_dir.path()).await.unwrap());

        tokio::fs::write(temp_dir.path().join("main.tf"), "").await.unwrap();
        assert!(!is_empty_dir(temp_dir.path()).await.unwrap());

        let missing = temp_dir.path().join("missing");
        assert!(matches!(
            is_empty_dir(&missing).await,
            Err(ProvisionError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_destroy_skips_uninitialized_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let terraform = Terraform::new().with_binary("definitely-not-installed-terraform");

        // No .terraform directory, so the binary is never invoked.
        let result = terraform
            .destroy(
                &ConfigRef::dir(temp_dir.path()),
                &ProvisionOptions::new(),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let temp_dir = tempfile::tempdir().unwrap();
        let terraform = Terraform::new().with_binary("definitely-not-installed-terraform");

        let result = terraform
            .apply(&ConfigRef::dir(temp_dir.path()), &ProvisionOptions::new())
            .await;
        assert!(matches!(result, Err(ProvisionError::BinaryNotFound { .. })));
    }

    #[tokio::test]
    async fn test_missing_config_dir() {
        let terraform = Terraform::new();
        let result = terraform
            .apply(
                &ConfigRef::dir("/nonexistent/infraprobe/config"),
                &ProvisionOptions::new(),
            )
            .await;
        assert!(matches!(result, Err(ProvisionError::InvalidConfig(_))));
    }
}
