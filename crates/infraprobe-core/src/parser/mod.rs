//! KDLパーサー
//!
//! infraprobe のスイートファイルを解析します。ノードの種類ごとにモジュールを分けています。

mod expect;
mod retry;
mod suite;

use suite::parse_suite;

use crate::error::{ProbeError, Result};
use crate::suite::SuiteFile;
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// スイートファイルを解析 (相対パスはファイルのディレクトリ基準で解決)
pub fn parse_suite_file<P: AsRef<Path>>(path: P) -> Result<SuiteFile> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Parsing suite file");

    let content = fs::read_to_string(path)?;
    let base_dir = path.parent().filter(|p| !p.as_os_str().is_empty());

    let mut file = parse_suite_string(&content, base_dir)?;
    if file.suites.is_empty() {
        return Err(ProbeError::NoSuites(path.to_path_buf()));
    }
    file.path = Some(path.to_path_buf());
    Ok(file)
}

/// 文字列からスイート定義を解析
pub fn parse_suite_string(content: &str, base_dir: Option<&Path>) -> Result<SuiteFile> {
    let doc: KdlDocument = content.parse()?;

    let mut file = SuiteFile::default();
    let mut seen = HashSet::new();

    for node in doc.nodes() {
        match node.name().value() {
            "suite" => {
                let suite = parse_suite(node, base_dir)?;
                if !seen.insert(suite.name.clone()) {
                    return Err(ProbeError::DuplicateSuite(suite.name));
                }
                file.suites.push(suite);
            }
            other => {
                warn!(node = other, "Ignoring unknown top-level node");
            }
        }
    }

    Ok(file)
}

/// 最初の位置引数 (文字列)
fn first_string(node: &KdlNode) -> Option<&str> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
}

/// 全ての位置引数 (文字列)
fn strings(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(str::to_string)
        .collect()
}

/// プロパティ値 (`key=value`)
fn property<'a>(node: &'a KdlNode, key: &str) -> Option<&'a KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .map(|e| e.value())
}

fn first_value(node: &KdlNode) -> Option<&KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn required_string(node: &KdlNode) -> Result<String> {
    first_string(node).map(str::to_string).ok_or_else(|| {
        ProbeError::InvalidConfig(format!("{} requires a string value", node.name().value()))
    })
}

fn required_bool(node: &KdlNode) -> Result<bool> {
    first_value(node).and_then(|v| v.as_bool()).ok_or_else(|| {
        ProbeError::InvalidConfig(format!(
            "{} requires #true or #false",
            node.name().value()
        ))
    })
}

fn required_count(node: &KdlNode) -> Result<u32> {
    first_value(node)
        .and_then(|v| v.as_integer())
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            ProbeError::InvalidConfig(format!(
                "{} requires a non-negative integer",
                node.name().value()
            ))
        })
}

fn required_number(node: &KdlNode) -> Result<f64> {
    first_value(node)
        .and_then(number)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .ok_or_else(|| {
            ProbeError::InvalidConfig(format!(
                "{} requires a non-negative number",
                node.name().value()
            ))
        })
}

/// 時間は秒で指定 (整数または小数)
fn required_seconds(node: &KdlNode) -> Result<Duration> {
    required_number(node).and_then(|secs| {
        Duration::try_from_secs_f64(secs).map_err(|_| {
            ProbeError::InvalidConfig(format!("{} is too large", node.name().value()))
        })
    })
}

fn number(value: &KdlValue) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|n| n as f64))
}

/// スカラー値をプロビジョニングツールに渡す文字列に変換
fn scalar(value: &KdlValue) -> Option<String> {
    if let Some(s) = value.as_string() {
        Some(s.to_string())
    } else if let Some(n) = value.as_integer() {
        Some(n.to_string())
    } else if let Some(f) = value.as_float() {
        Some(f.to_string())
    } else {
        value.as_bool().map(|b| b.to_string())
    }
}
