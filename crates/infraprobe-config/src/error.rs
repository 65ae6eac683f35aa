use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "スイートファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: probe.local.kdl, .probe.local.kdl, probe.kdl, .probe.kdl\n\
        - ./.infraprobe/ ディレクトリ\n\
        - ~/.config/infraprobe/probe.kdl\n\
        または PROBE_CONFIG_PATH 環境変数で直接指定できます"
    )]
    SuiteFileNotFound,

    #[error("PROBE_CONFIG_PATH のファイルが存在しません: {0}")]
    ConfigPathMissing(PathBuf),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
