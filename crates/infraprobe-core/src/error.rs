use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("スイートファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("無効なスイート設定: {0}")]
    InvalidConfig(String),

    #[error("無効なリトライ判定パターン: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("スイート '{0}' が重複して定義されています")]
    DuplicateSuite(String),

    #[error("スイートが見つかりません: {0}")]
    SuiteNotFound(String),

    #[error(
        "スイート '{first}' と '{second}' が同じ設定を対象にしています: {config}\nヒント: 同じ設定に対する実行は別々の呼び出しに分けてください"
    )]
    SharedConfig {
        first: String,
        second: String,
        config: String,
    },

    #[error("スイートが定義されていません: {0}")]
    NoSuites(PathBuf),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
