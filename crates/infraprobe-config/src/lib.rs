pub mod error;

pub use error::*;

use std::path::{Path, PathBuf};
use tracing::debug;

/// スイートファイルを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "PROBE_CONFIG_PATH";

/// 各ディレクトリで探すファイル名 (優先順)
pub const SUITE_FILE_NAMES: [&str; 4] = [
    "probe.local.kdl",
    ".probe.local.kdl",
    "probe.kdl",
    ".probe.kdl",
];

const PROJECT_DIR: &str = ".infraprobe";
const APP_DIR: &str = "infraprobe";

/// infraprobeのグローバル設定ディレクトリ (`~/.config/infraprobe`)
pub fn global_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

/// カレントディレクトリのスイートファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 PROBE_CONFIG_PATH (指定時はファイルが存在すること)
/// 2. カレントディレクトリ: probe.local.kdl, .probe.local.kdl, probe.kdl, .probe.kdl
/// 3. ./.infraprobe/ ディレクトリ内: 同様の順序
/// 4. ~/.config/infraprobe/probe.kdl (グローバル設定)
pub fn find_suite_file() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        debug!(path = %path.display(), "Using {}", CONFIG_PATH_ENV);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::ConfigPathMissing(path))
        };
    }

    let current_dir = std::env::current_dir()?;
    search_from(&current_dir, global_config_dir().as_deref())
}

/// `dir`、`dir/.infraprobe`、グローバルディレクトリの順にスイートファイルを探す
pub fn search_from(dir: &Path, global_dir: Option<&Path>) -> Result<PathBuf> {
    let project_dir = dir.join(PROJECT_DIR);

    let local = [dir, project_dir.as_path()]
        .into_iter()
        .flat_map(|base| SUITE_FILE_NAMES.iter().map(move |name| base.join(name)));
    let global = global_dir.map(|g| g.join("probe.kdl"));

    local
        .chain(global)
        .inspect(|candidate| debug!(candidate = %candidate.display(), "Looking for suite file"))
        .find(|candidate| candidate.is_file())
        .ok_or(ConfigError::SuiteFileNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_finds_file_in_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("probe.kdl"), "// test").unwrap();

        let found = search_from(temp_dir.path(), None).unwrap();
        assert_eq!(found, temp_dir.path().join("probe.kdl"));
    }

    #[test]
    fn test_local_file_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("probe.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join("probe.local.kdl"), "// local").unwrap();

        let found = search_from(temp_dir.path(), None).unwrap();
        assert!(found.ends_with("probe.local.kdl"));
    }

    #[test]
    fn test_hidden_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(".probe.kdl"), "// hidden").unwrap();

        let found = search_from(temp_dir.path(), None).unwrap();
        assert!(found.ends_with(".probe.kdl"));
    }

    #[test]
    fn test_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join(".infraprobe");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("probe.kdl"), "// project").unwrap();

        let found = search_from(temp_dir.path(), None).unwrap();
        assert!(found.ends_with(".infraprobe/probe.kdl"));
    }

    #[test]
    fn test_working_dir_beats_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join(".infraprobe");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("probe.local.kdl"), "// project").unwrap();
        fs::write(temp_dir.path().join("probe.kdl"), "// cwd").unwrap();

        let found = search_from(temp_dir.path(), None).unwrap();
        assert_eq!(found, temp_dir.path().join("probe.kdl"));
    }

    #[test]
    fn test_global_fallback() {
        let temp_dir = tempfile::tempdir().unwrap();
        let global_dir = tempfile::tempdir().unwrap();
        fs::write(global_dir.path().join("probe.kdl"), "// global").unwrap();

        let found = search_from(temp_dir.path(), Some(global_dir.path())).unwrap();
        assert_eq!(found, global_dir.path().join("probe.kdl"));
    }

    #[test]
    fn test_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = search_from(temp_dir.path(), None);
        assert!(matches!(result, Err(ConfigError::SuiteFileNotFound)));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("スイートファイルが見つかりません"));
        assert!(message.contains("PROBE_CONFIG_PATH"));
    }

    #[test]
    fn test_global_config_dir() {
        if let Some(dir) = global_config_dir() {
            assert!(dir.ends_with("infraprobe"));
        }
    }

    #[test]
    #[serial]
    fn test_env_var_overrides_search() {
        let temp_dir = tempfile::tempdir().unwrap();
        let custom = temp_dir.path().join("suites.kdl");
        fs::write(&custom, "// custom").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(&custom), || {
            assert_eq!(find_suite_file().unwrap(), custom);
        });
    }

    #[test]
    #[serial]
    fn test_env_var_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("nope.kdl");

        temp_env::with_var(CONFIG_PATH_ENV, Some(&missing), || {
            let err = find_suite_file().unwrap_err();
            assert!(matches!(err, ConfigError::ConfigPathMissing(p) if p == missing));
        });
    }
}
