//! Provisioning results and output values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single output value exposed after apply.
///
/// Most outputs are plain strings; lists, maps and numbers are kept as
/// structured JSON so assertions can inspect them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputValue(serde_json::Value);

impl OutputValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self(serde_json::Value::String(value.into()))
    }

    pub fn structured(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// The string value, if this output is a string
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// The elements of a list (or set/tuple) output
    pub fn as_list(&self) -> Option<&[serde_json::Value]> {
        self.0.as_array().map(|v| v.as_slice())
    }

    /// List elements rendered as text
    pub fn list_items(&self) -> Option<Vec<String>> {
        self.as_list()
            .map(|items| items.iter().map(render_json).collect())
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            serde_json::Value::Null => true,
            serde_json::Value::String(s) => s.is_empty(),
            serde_json::Value::Array(items) => items.is_empty(),
            serde_json::Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Text form used in reports and substring checks.
    ///
    /// Strings are rendered without quotes, everything else as compact JSON.
    pub fn render(&self) -> String {
        render_json(&self.0)
    }
}

fn render_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<&str> for OutputValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for OutputValue {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

impl From<serde_json::Value> for OutputValue {
    fn from(value: serde_json::Value) -> Self {
        Self::structured(value)
    }
}

/// Outputs produced by a successful apply, indexed by output name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningResult {
    pub outputs: BTreeMap<String, OutputValue>,
}

impl ProvisioningResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<OutputValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<OutputValue>) {
        self.outputs.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        self.outputs.get(name)
    }

    /// Output names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ProvisioningResult
where
    K: Into<String>,
    V: Into<OutputValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut result = Self::new();
        for (name, value) in iter {
            result.insert(name, value);
        }
        result
    }
}
