//! Limits how often sensitive leaves can be read.

use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use super::{NodeProcessor, Processed};
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::node::{meta_keys, ConfigNode, LeafNode, LeafPayload, MetaValue};
use crate::secrets::TemporaryValue;
use crate::settings::SecretSettings;

#[cfg(test)]
#[path = "temporary_tests.rs"]
mod tests;

/// Wraps leaves in a [`TemporaryValue`] with a read budget.
///
/// The budget is the larger of the largest matching path rule and the
/// `temporary` count carried by the leaf itself.
#[derive(Debug, Clone, Default)]
pub struct TemporaryProcessor {
    rules: Vec<(Regex, u32)>,
}

impl TemporaryProcessor {
    pub fn new(rules: Vec<(Regex, u32)>) -> Self {
        Self { rules }
    }

    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidConfiguration` for an invalid
    /// pattern.
    pub fn from_settings(settings: &SecretSettings) -> ConfigurationResult<Self> {
        let rules = settings
            .temporary
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|regex| (regex, rule.reads))
                    .map_err(|e| ConfigurationError::InvalidConfiguration {
                        field: "secrets.temporary".to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    fn budget(&self, path: &str, leaf: &LeafNode) -> Option<u32> {
        let by_path = self
            .rules
            .iter()
            .filter(|(regex, _)| regex.is_match(path))
            .map(|(_, reads)| *reads)
            .max();
        by_path.max(leaf.max_count(meta_keys::TEMPORARY))
    }
}

impl NodeProcessor for TemporaryProcessor {
    fn name(&self) -> &str {
        "temporary"
    }

    fn process(&self, path: &str, node: ConfigNode) -> Processed {
        let leaf = match node {
            ConfigNode::Leaf(leaf) => leaf,
            other => return Processed::unchanged(other),
        };
        if matches!(leaf.payload(), LeafPayload::Temporary(_) | LeafPayload::Plain(None)) {
            return Processed::unchanged(ConfigNode::Leaf(leaf));
        }
        let Some(budget) = self.budget(path, &leaf) else {
            return Processed::unchanged(ConfigNode::Leaf(leaf));
        };

        debug!("Limiting '{}' to {} read(s)", path, budget);
        let (payload, mut metadata) = leaf.into_parts();
        metadata.insert(
            meta_keys::TEMPORARY.to_string(),
            vec![MetaValue::Count(budget)],
        );
        let mut wrapped = LeafNode::from_payload(
            LeafPayload::Temporary(Arc::new(TemporaryValue::new(payload, budget))),
            metadata,
        );
        if !wrapped.has_flag(meta_keys::NO_CACHE) {
            wrapped = wrapped.with_metadata(meta_keys::NO_CACHE, vec![MetaValue::Flag(true)]);
        }
        Processed::unchanged(ConfigNode::Leaf(wrapped))
    }
}
