use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Stand-in for the terraform CLI: records its arguments in `calls.log` in
/// the working directory and prints fixed outputs.
const FAKE_TERRAFORM: &str = r#"#!/bin/sh
echo "$1" >> calls.log
case "$1" in
  init)
    mkdir -p .terraform
    ;;
  apply)
    if [ -f fail-apply ]; then
      echo "Error: creating Budget: AccessDeniedException: not authorized" >&2
      exit 1
    fi
    ;;
  output)
    echo '{"budget_notification_emails":{"sensitive":false,"type":"string","value":"Lerato.Taunyane@bbd.co.za,ops@example.com"},"budget_name":{"sensitive":false,"type":"string","value":"monthly"}}'
    ;;
  destroy)
    ;;
esac
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("infra")).unwrap();
        Self { root }
    }

    pub fn write_probe_kdl(&self, content: &str) {
        fs::write(self.root.path().join("probe.kdl"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn infra_dir(&self) -> PathBuf {
        self.root.path().join("infra")
    }

    /// Make the fake CLI fail every apply
    #[allow(dead_code)]
    pub fn fail_apply(&self) {
        fs::write(self.infra_dir().join("fail-apply"), "").unwrap();
    }

    /// Subcommands the fake CLI was invoked with, in order
    #[allow(dead_code)]
    pub fn terraform_calls(&self) -> Vec<String> {
        fs::read_to_string(self.infra_dir().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    pub fn install_fake_terraform(&self) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = self.root.path().join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        let path = bin_dir.join("terraform");
        fs::write(&path, FAKE_TERRAFORM).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}

/// Suite targeting `infra/` that expects `needle` in the notification emails
pub fn budget_suite(needle: &str) -> String {
    format!(
        r#"
suite "budget-notifications" {{
    dir "infra"
    reconfigure #true
    retry {{
        max-retries 1
    }}
    expect "budget_notification_emails" contains="{}"
}}
"#,
        needle
    )
}
