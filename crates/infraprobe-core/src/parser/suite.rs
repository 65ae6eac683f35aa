//! suite ノードの解析

use super::expect::parse_expect;
use super::retry::parse_retry;
use super::{required_bool, required_seconds, required_string, scalar, strings};
use crate::error::{ProbeError, Result};
use crate::suite::Suite;
use infraprobe_provision::ConfigRef;
use kdl::KdlNode;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// `suite` ノードを解析
pub fn parse_suite(node: &KdlNode, base_dir: Option<&Path>) -> Result<Suite> {
    let name = required_string(node)
        .map_err(|_| ProbeError::InvalidConfig("suite requires a name".to_string()))?;

    let invalid = |msg: String| ProbeError::InvalidConfig(format!("suite '{}': {}", name, msg));

    let children = node
        .children()
        .ok_or_else(|| invalid("missing body (dir or module is required)".to_string()))?;

    let mut config: Option<ConfigRef> = None;
    let mut suite = Suite::new(name.clone(), ConfigRef::dir("."));

    for child in children.nodes() {
        match child.name().value() {
            "dir" => {
                let dir = resolve(base_dir, PathBuf::from(required_string(child)?));
                if config.replace(ConfigRef::Dir(dir)).is_some() {
                    return Err(invalid("only one of dir/module may be given".to_string()));
                }
            }
            "module" => {
                if config
                    .replace(ConfigRef::Module(required_string(child)?))
                    .is_some()
                {
                    return Err(invalid("only one of dir/module may be given".to_string()));
                }
            }
            "reconfigure" => {
                suite.options.provision.reconfigure = required_bool(child)?;
            }
            "lock" => {
                suite.options.provision.lock = required_bool(child)?;
            }
            "timeout" => {
                let timeout = required_seconds(child)?;
                if timeout.is_zero() {
                    return Err(invalid("timeout must be greater than zero".to_string()));
                }
                suite.options.run_timeout = Some(timeout);
            }
            "retry" => {
                let (policy, errors) = parse_retry(child)?;
                suite.options.retry = policy;
                suite.options.retryable_errors = errors;
            }
            "vars" => {
                suite
                    .options
                    .provision
                    .vars
                    .extend(parse_pairs(child).map_err(invalid)?);
            }
            "env" => {
                suite
                    .options
                    .provision
                    .env
                    .extend(parse_pairs(child).map_err(invalid)?);
            }
            "var-files" | "var-file" => {
                suite
                    .options
                    .provision
                    .var_files
                    .extend(strings(child).into_iter().map(|f| resolve(base_dir, f.into())));
            }
            "expect" => {
                suite.assertions.extend(parse_expect(child)?);
            }
            other => {
                warn!(suite = %name, node = other, "Ignoring unknown suite setting");
            }
        }
    }

    suite.config = config.ok_or_else(|| invalid("dir or module is required".to_string()))?;
    Ok(suite)
}

/// `vars { key "value" }` 形式のブロック
fn parse_pairs(node: &KdlNode) -> std::result::Result<BTreeMap<String, String>, String> {
    let mut pairs = BTreeMap::new();

    if let Some(children) = node.children() {
        for pair in children.nodes() {
            let key = pair.name().value().to_string();
            let value = pair
                .entries()
                .first()
                .and_then(|e| scalar(e.value()))
                .ok_or_else(|| format!("{} '{}' requires a value", node.name().value(), key))?;
            pairs.insert(key, value);
        }
    }

    Ok(pairs)
}

fn resolve(base_dir: Option<&Path>, path: PathBuf) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}
