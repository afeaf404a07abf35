//! Seals sensitive leaves so their plaintext is not kept in memory.

use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use super::{NodeProcessor, Processed};
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::node::{meta_keys, ConfigNode, LeafNode, LeafPayload, MetaValue};
use crate::secrets::EncryptedValue;
use crate::settings::SecretSettings;
use crate::validation::{IssueKind, ValidationIssue};

#[cfg(test)]
#[path = "encryption_tests.rs"]
mod tests;

/// Replaces plain leaves with [`EncryptedValue`] payloads.
///
/// A leaf is sealed when its path matches one of the configured patterns or
/// when it carries the `encrypted` flag. Each leaf gets its own key and nonce.
#[derive(Debug, Clone, Default)]
pub struct EncryptionProcessor {
    patterns: Vec<Regex>,
}

impl EncryptionProcessor {
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidConfiguration` for an invalid
    /// pattern.
    pub fn from_settings(settings: &SecretSettings) -> ConfigurationResult<Self> {
        let patterns = settings
            .encrypted_paths
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigurationError::InvalidConfiguration {
                    field: "secrets.encrypted_paths".to_string(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(patterns))
    }

    fn applies(&self, path: &str, leaf: &LeafNode) -> bool {
        leaf.has_flag(meta_keys::ENCRYPTED) || self.patterns.iter().any(|p| p.is_match(path))
    }
}

impl NodeProcessor for EncryptionProcessor {
    fn name(&self) -> &str {
        "encryption"
    }

    fn process(&self, path: &str, node: ConfigNode) -> Processed {
        let leaf = match node {
            ConfigNode::Leaf(leaf) => leaf,
            other => return Processed::unchanged(other),
        };
        if !self.applies(path, &leaf) {
            return Processed::unchanged(ConfigNode::Leaf(leaf));
        }
        let Some(value) = leaf.plain_value() else {
            return Processed::unchanged(ConfigNode::Leaf(leaf));
        };

        match EncryptedValue::seal(value) {
            Ok(sealed) => {
                debug!("Sealed configuration value at '{}'", path);
                let (_, metadata) = leaf.into_parts();
                let mut sealed_leaf =
                    LeafNode::from_payload(LeafPayload::Encrypted(Arc::new(sealed)), metadata);
                for flag in [meta_keys::ENCRYPTED, meta_keys::NO_CACHE] {
                    if !sealed_leaf.has_flag(flag) {
                        sealed_leaf = sealed_leaf.with_metadata(flag, vec![MetaValue::Flag(true)]);
                    }
                }
                Processed::unchanged(ConfigNode::Leaf(sealed_leaf))
            }
            Err(e) => {
                let issue = ValidationIssue::error(
                    IssueKind::EncryptionFailure,
                    path,
                    format!("Failed to seal value: {}", e),
                );
                Processed::with_issues(ConfigNode::Leaf(leaf), vec![issue])
            }
        }
    }
}
