//! Node processing pipeline.
//!
//! After the sources of a load are merged, the tree passes through a set of
//! [`NodeProcessor`]s. Every node is offered to each processor in ascending
//! priority order, each receiving the node the previous one returned; the
//! pipeline then descends into the children of the final node. A processor
//! that rewrites a map can therefore inject children (see [`IncludeProcessor`])
//! and those children are processed like any other part of the tree.
//!
//! The built-in processors and their default priorities:
//!
//! | Priority | Processor |
//! |----------|-----------|
//! | 100 | [`AnnotationProcessor`] |
//! | 400 | [`EncryptionProcessor`] |
//! | 500 | [`TemporaryProcessor`] |
//! | 500 | [`IncludeProcessor`] (registered after the temporary processor) |

use std::sync::Arc;
use tracing::debug;

use crate::lexer::{join_index, join_key};
use crate::node::{ConfigNode, MapNode};
use crate::validation::{Validated, ValidationIssue};

pub mod annotations;
pub mod encryption;
pub mod include;
pub mod temporary;

pub use annotations::{
    AnnotationError, AnnotationProcessor, AnnotationTransform, FlagAnnotation, TemporaryAnnotation,
};
pub use encryption::EncryptionProcessor;
pub use include::{IncludeError, IncludeProcessor, SourceFactory, SourceFactoryRegistry};
pub use temporary::TemporaryProcessor;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

/// Default priority of the annotation processor.
pub const ANNOTATION_PRIORITY: i32 = 100;
/// Default priority of the encryption processor.
pub const ENCRYPTION_PRIORITY: i32 = 400;
/// Default priority of the temporary-secret processor.
pub const TEMPORARY_PRIORITY: i32 = 500;
/// Default priority of the include processor.
pub const INCLUDE_PRIORITY: i32 = 500;

/// The outcome of one processor on one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub node: ConfigNode,
    pub issues: Vec<ValidationIssue>,
}

impl Processed {
    /// The node passes through untouched.
    pub fn unchanged(node: ConfigNode) -> Self {
        Self {
            node,
            issues: Vec::new(),
        }
    }

    pub fn with_issues(node: ConfigNode, issues: Vec<ValidationIssue>) -> Self {
        Self { node, issues }
    }
}

/// A rewriting pass over configuration nodes.
///
/// `process` always returns a node, even when it reports errors; the node it
/// returns replaces the one it was given.
pub trait NodeProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, path: &str, node: ConfigNode) -> Processed;
}

/// An ordered set of processors.
#[derive(Clone, Default)]
pub struct ProcessorPipeline {
    processors: Vec<(i32, Arc<dyn NodeProcessor>)>,
}

impl ProcessorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a processor. Lower priorities run first; processors with equal
    /// priority run in registration order.
    pub fn register(&mut self, priority: i32, processor: Arc<dyn NodeProcessor>) {
        let position = self
            .processors
            .iter()
            .position(|(existing, _)| *existing > priority)
            .unwrap_or(self.processors.len());
        self.processors.insert(position, (priority, processor));
    }

    /// Names of the registered processors in execution order.
    pub fn processor_names(&self) -> Vec<String> {
        self.processors
            .iter()
            .map(|(_, p)| p.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Runs every processor over the whole tree.
    pub fn run(&self, root: ConfigNode) -> Validated<ConfigNode> {
        debug!(
            "Running {} processor(s) over the configuration tree",
            self.processors.len()
        );

        let mut issues = Vec::new();
        let node = self.process_node("", root, &mut issues);
        Validated::with_issues(node, issues)
    }

    fn process_node(
        &self,
        path: &str,
        node: ConfigNode,
        issues: &mut Vec<ValidationIssue>,
    ) -> ConfigNode {
        let mut current = node;
        for (_, processor) in &self.processors {
            let processed = processor.process(path, current);
            issues.extend(processed.issues);
            current = processed.node;
        }

        match current {
            ConfigNode::Leaf(_) => current,
            ConfigNode::Map(map) => {
                let mut processed = MapNode::new();
                for (key, child) in map {
                    let child = self.process_node(&join_key(path, &key), child, issues);
                    processed.insert(key, child);
                }
                ConfigNode::Map(processed)
            }
            ConfigNode::Array(array) => ConfigNode::array(
                array
                    .into_items()
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| self.process_node(&join_index(path, i), item, issues))
                    .collect(),
            ),
        }
    }
}

impl std::fmt::Debug for ProcessorPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries: Vec<(i32, &str)> = self
            .processors
            .iter()
            .map(|(priority, p)| (*priority, p.name()))
            .collect();
        f.debug_struct("ProcessorPipeline")
            .field("processors", &entries)
            .finish()
    }
}
