//! Tree merging engine.
//!
//! Combines an accumulated tree (`base`) with a newly loaded one (`overlay`).
//! The overlay takes precedence:
//!
//! 1. **Leaf + Leaf** - the overlay leaf wins entirely, value and metadata.
//! 2. **Map + Map** - keys are merged recursively; keys present on one side
//!    only pass through unchanged.
//! 3. **Array + Array** - elements are merged index by index; the longer
//!    array's tail passes through.
//! 4. **Mismatched kinds** - the overlay's node replaces the base subtree.
//!    This is an intentional type override and is reported as a `DEBUG`
//!    `KindOverride` issue so it never happens silently.
//!
//! The same merge composes ordered sources, applies tagged overlays and
//! injects included subtrees.
//!
//! # Examples
//!
//! ```rust
//! use config_resolver::{ConfigNode, TreeMerger};
//!
//! let base = ConfigNode::map([("port", ConfigNode::leaf("80")), ("host", ConfigNode::leaf("a"))]);
//! let overlay = ConfigNode::map([("port", ConfigNode::leaf("8080"))]);
//!
//! let merged = TreeMerger::new().merge(base, overlay, "").value.unwrap();
//! let map = merged.as_map().unwrap();
//! assert_eq!(map.get("port"), Some(&ConfigNode::leaf("8080")));
//! assert_eq!(map.get("host"), Some(&ConfigNode::leaf("a")));
//! ```

use crate::lexer::{join_index, join_key};
use crate::node::{ConfigNode, MapNode};
use crate::validation::{IssueKind, Validated, ValidationIssue};

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;

/// Tree merging engine.
///
/// Stateless - it takes two trees and produces a new one without keeping
/// anything between calls.
#[derive(Debug, Clone, Default)]
pub struct TreeMerger {}

impl TreeMerger {
    pub fn new() -> Self {
        Self {}
    }

    /// Merges `overlay` onto `base`. `path` is the location of both trees,
    /// used for diagnostics.
    pub fn merge(&self, base: ConfigNode, overlay: ConfigNode, path: &str) -> Validated<ConfigNode> {
        let mut issues = Vec::new();
        let node = merge_nodes(base, overlay, path, &mut issues);
        Validated::with_issues(node, issues)
    }

    /// Folds `trees` left to right, later trees taking precedence.
    pub fn merge_all(&self, trees: impl IntoIterator<Item = ConfigNode>, path: &str) -> Validated<ConfigNode> {
        let mut issues = Vec::new();
        let mut merged: Option<ConfigNode> = None;
        for tree in trees {
            merged = Some(match merged {
                Some(base) => merge_nodes(base, tree, path, &mut issues),
                None => tree,
            });
        }
        Validated::with_issues(merged.unwrap_or_else(ConfigNode::empty_map), issues)
    }
}

fn merge_nodes(
    base: ConfigNode,
    overlay: ConfigNode,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> ConfigNode {
    match (base, overlay) {
        (ConfigNode::Leaf(_), overlay @ ConfigNode::Leaf(_)) => overlay,
        (ConfigNode::Map(base), ConfigNode::Map(overlay)) => {
            let mut merged: MapNode = base;
            for (key, child) in overlay {
                let child_path = join_key(path, &key);
                let node = match merged.remove(&key) {
                    Some(existing) => merge_nodes(existing, child, &child_path, issues),
                    None => child,
                };
                merged.insert(key, node);
            }
            ConfigNode::Map(merged)
        }
        (ConfigNode::Array(base), ConfigNode::Array(overlay)) => {
            let mut base_items = base.into_items().into_iter();
            let mut overlay_items = overlay.into_items().into_iter();
            let mut items = Vec::new();
            loop {
                let index = items.len();
                let next = match (base_items.next(), overlay_items.next()) {
                    (Some(b), Some(o)) => merge_nodes(b, o, &join_index(path, index), issues),
                    (Some(b), None) => b,
                    (None, Some(o)) => o,
                    (None, None) => break,
                };
                items.push(next);
            }
            ConfigNode::array(items)
        }
        (base, overlay) => {
            issues.push(ValidationIssue::debug(
                IssueKind::KindOverride,
                path,
                format!(
                    "Replacing {} with {} at '{}'",
                    base.kind(),
                    overlay.kind(),
                    path
                ),
            ));
            overlay
        }
    }
}
