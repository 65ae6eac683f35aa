pub mod run;
pub mod validate;

use anyhow::Context;
use infraprobe_core::SuiteFile;
use std::path::PathBuf;

/// `--file` if given, otherwise the discovered suite file
fn load_suite_file(file: Option<PathBuf>) -> anyhow::Result<SuiteFile> {
    let path = match file {
        Some(path) => path,
        None => infraprobe_config::find_suite_file()?,
    };

    infraprobe_core::parse_suite_file(&path)
        .with_context(|| format!("スイートファイルを読み込めません: {}", path.display()))
}
