//! Format loaders.
//!
//! JSON and TOML documents become trees: objects and tables are maps,
//! arrays are arrays, and every scalar becomes a leaf holding its textual
//! form. `null` becomes a leaf without a value. Properties files become
//! pairs and are compiled by the resolver like any other pair source.

use config_resolver::{ConfigNode, FormatLoader, LeafNode, LoaderRegistry, SourceError, SourcePayload};
use std::sync::Arc;

#[cfg(test)]
#[path = "loaders_tests.rs"]
mod tests;

/// A registry with every loader of this crate.
pub fn default_loaders() -> LoaderRegistry {
    let mut registry = LoaderRegistry::new();
    registry.register(Arc::new(JsonLoader::new()));
    registry.register(Arc::new(TomlLoader::new()));
    registry.register(Arc::new(PropertiesLoader::new()));
    registry
}

fn utf8<'c>(format: &str, content: &'c [u8]) -> Result<&'c str, SourceError> {
    std::str::from_utf8(content).map_err(|e| SourceError::ParseFailed {
        format: format.to_string(),
        reason: e.to_string(),
    })
}

/// Loads JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLoader {}

impl JsonLoader {
    pub fn new() -> Self {
        Self {}
    }
}

impl FormatLoader for JsonLoader {
    fn name(&self) -> &str {
        "json"
    }

    fn accepts(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case("json")
    }

    fn load(&self, content: &[u8]) -> Result<SourcePayload, SourceError> {
        let value: serde_json::Value =
            serde_json::from_slice(content).map_err(|e| SourceError::ParseFailed {
                format: "json".to_string(),
                reason: e.to_string(),
            })?;
        Ok(SourcePayload::Tree(json_node(value)))
    }
}

fn json_node(value: serde_json::Value) -> ConfigNode {
    use serde_json::Value;
    match value {
        Value::Null => ConfigNode::Leaf(LeafNode::empty()),
        Value::Bool(b) => ConfigNode::leaf(b.to_string()),
        Value::Number(n) => ConfigNode::leaf(n.to_string()),
        Value::String(s) => ConfigNode::leaf(s),
        Value::Array(items) => ConfigNode::array(items.into_iter().map(json_node).collect()),
        Value::Object(entries) => {
            ConfigNode::map(entries.into_iter().map(|(k, v)| (k, json_node(v))))
        }
    }
}

/// Loads TOML documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlLoader {}

impl TomlLoader {
    pub fn new() -> Self {
        Self {}
    }
}

impl FormatLoader for TomlLoader {
    fn name(&self) -> &str {
        "toml"
    }

    fn accepts(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case("toml")
    }

    fn load(&self, content: &[u8]) -> Result<SourcePayload, SourceError> {
        let text = utf8("toml", content)?;
        let table: toml::Table = toml::from_str(text).map_err(|e| SourceError::ParseFailed {
            format: "toml".to_string(),
            reason: e.to_string(),
        })?;
        Ok(SourcePayload::Tree(toml_node(toml::Value::Table(table))))
    }
}

fn toml_node(value: toml::Value) -> ConfigNode {
    use toml::Value;
    match value {
        Value::String(s) => ConfigNode::leaf(s),
        Value::Integer(i) => ConfigNode::leaf(i.to_string()),
        Value::Float(f) => ConfigNode::leaf(f.to_string()),
        Value::Boolean(b) => ConfigNode::leaf(b.to_string()),
        Value::Datetime(d) => ConfigNode::leaf(d.to_string()),
        Value::Array(items) => ConfigNode::array(items.into_iter().map(toml_node).collect()),
        Value::Table(entries) => {
            ConfigNode::map(entries.into_iter().map(|(k, v)| (k, toml_node(v))))
        }
    }
}

/// Loads `key=value` (or `key: value`) lines.
///
/// Lines split at the first `=`; `:` is only used on lines without one.
/// Blank lines and lines starting with `#` or `!` are skipped. Lines without
/// a separator are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertiesLoader {}

impl PropertiesLoader {
    pub fn new() -> Self {
        Self {}
    }
}

impl FormatLoader for PropertiesLoader {
    fn name(&self) -> &str {
        "properties"
    }

    fn accepts(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case("properties") || format.eq_ignore_ascii_case("props")
    }

    fn load(&self, content: &[u8]) -> Result<SourcePayload, SourceError> {
        let text = utf8("properties", content)?;
        let mut pairs = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let split = line
                .find('=')
                .or_else(|| line.find(':'))
                .ok_or_else(|| SourceError::ParseFailed {
                    format: "properties".to_string(),
                    reason: format!("Line {} has no '=' or ':' separator", number + 1),
                })?;
            let key = line[..split].trim();
            let value = line[split + 1..].trim();
            pairs.push((key.to_string(), value.to_string()));
        }
        Ok(SourcePayload::Pairs(pairs))
    }
}
