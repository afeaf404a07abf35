//! Configuration tree nodes.
//!
//! A [`ConfigNode`] is a closed set of variants: a leaf holding an optional
//! string value plus metadata, a map of named children, or a dense array of
//! children. Nodes are never changed after construction; every stage of the
//! engine builds new nodes.
//!
//! Leaves may carry a decorated payload (see [`crate::secrets`]) that decrypts
//! or enforces an access budget on every read. Decorated payloads are shared
//! between clones of a tree, so cloning never resets a budget.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::lexer::{join_index, join_key, render_path, PathToken, SentenceNormalizer};
use crate::secrets::{EncryptedValue, TemporaryValue};
use crate::validation::{IssueKind, Validated, ValidationIssue};

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;

/// Well-known metadata keys attached to leaves.
pub mod meta_keys {
    /// The value must never appear in logs or messages.
    pub const SECRET: &str = "secret";
    /// Values decoded through this leaf must not be cached.
    pub const NO_CACHE: &str = "no_cache";
    /// The value may only be read a limited number of times.
    pub const TEMPORARY: &str = "temporary";
    /// The value is held encrypted in memory.
    pub const ENCRYPTED: &str = "encrypted";
}

/// A typed metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    Flag(bool),
    Count(u32),
    Text(String),
}

/// Metadata attached to a leaf: key to list of values.
pub type Metadata = BTreeMap<String, Vec<MetaValue>>;

/// The kind of a node, ignoring its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Map,
    Array,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf => write!(f, "leaf"),
            Self::Map => write!(f, "map"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// What a leaf holds.
#[derive(Clone)]
pub enum LeafPayload {
    /// A value kept as given.
    Plain(Option<String>),
    /// A value that is decrypted on every read.
    Encrypted(Arc<EncryptedValue>),
    /// A value that may only be read a limited number of times.
    Temporary(Arc<TemporaryValue>),
}

impl LeafPayload {
    /// Reads the value through whichever decorator wraps it.
    pub fn read(&self) -> Option<String> {
        match self {
            Self::Plain(value) => value.clone(),
            Self::Encrypted(encrypted) => encrypted.reveal(),
            Self::Temporary(temporary) => temporary.access(),
        }
    }

    pub fn is_decorated(&self) -> bool {
        !matches!(self, Self::Plain(_))
    }
}

impl fmt::Debug for LeafPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Self::Encrypted(_) => write!(f, "Encrypted(..)"),
            Self::Temporary(temporary) => {
                write!(f, "Temporary(remaining: {})", temporary.remaining())
            }
        }
    }
}

impl PartialEq for LeafPayload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Plain(a), Self::Plain(b)) => a == b,
            (Self::Encrypted(a), Self::Encrypted(b)) => Arc::ptr_eq(a, b),
            (Self::Temporary(a), Self::Temporary(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A scalar node.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    payload: LeafPayload,
    metadata: Metadata,
}

impl LeafNode {
    /// A leaf holding `value`.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            payload: LeafPayload::Plain(Some(value.into())),
            metadata: Metadata::new(),
        }
    }

    /// A leaf with no value, as produced by a `null` in a structured format.
    pub fn empty() -> Self {
        Self {
            payload: LeafPayload::Plain(None),
            metadata: Metadata::new(),
        }
    }

    pub fn from_payload(payload: LeafPayload, metadata: Metadata) -> Self {
        Self { payload, metadata }
    }

    /// Adds metadata values under `key`.
    pub fn with_metadata(mut self, key: &str, values: Vec<MetaValue>) -> Self {
        self.metadata.entry(key.to_string()).or_default().extend(values);
        self
    }

    /// Reads the value. Decorated leaves decrypt or spend access budget here.
    pub fn value(&self) -> Option<String> {
        self.payload.read()
    }

    /// The value of an undecorated leaf, without side effects.
    pub fn plain_value(&self) -> Option<&str> {
        match &self.payload {
            LeafPayload::Plain(value) => value.as_deref(),
            _ => None,
        }
    }

    pub fn payload(&self) -> &LeafPayload {
        &self.payload
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Splits into payload and metadata.
    pub fn into_parts(self) -> (LeafPayload, Metadata) {
        (self.payload, self.metadata)
    }

    /// Returns `true` if `key` carries a `Flag(true)`.
    pub fn has_flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .is_some_and(|values| values.contains(&MetaValue::Flag(true)))
    }

    /// The largest count stored under `key`.
    pub fn max_count(&self, key: &str) -> Option<u32> {
        self.metadata.get(key).and_then(|values| {
            values
                .iter()
                .filter_map(|v| match v {
                    MetaValue::Count(count) => Some(*count),
                    _ => None,
                })
                .max()
        })
    }

    /// Leaves that must be masked in messages.
    pub fn is_secret(&self) -> bool {
        self.payload.is_decorated()
            || self.has_flag(meta_keys::SECRET)
            || self.metadata.contains_key(meta_keys::TEMPORARY)
            || self.has_flag(meta_keys::ENCRYPTED)
    }

    /// Leaves whose decoded results must not be memoized.
    pub fn is_uncacheable(&self) -> bool {
        self.payload.is_decorated() || self.has_flag(meta_keys::NO_CACHE) || self.is_secret()
    }
}

/// A keyed container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapNode {
    entries: BTreeMap<String, ConfigNode>,
}

impl MapNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, node: ConfigNode) -> Option<ConfigNode> {
        self.entries.insert(key.into(), node)
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigNode> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigNode)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

impl IntoIterator for MapNode {
    type Item = (String, ConfigNode);
    type IntoIter = std::collections::btree_map::IntoIter<String, ConfigNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, ConfigNode)> for MapNode {
    fn from_iter<I: IntoIterator<Item = (String, ConfigNode)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A dense, 0-based sequence of nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayNode {
    items: Vec<ConfigNode>,
}

impl ArrayNode {
    pub fn new(items: Vec<ConfigNode>) -> Self {
        Self { items }
    }

    pub fn get(&self, index: usize) -> Option<&ConfigNode> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigNode> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<ConfigNode> {
        self.items
    }
}

/// A node of the configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Leaf(LeafNode),
    Map(MapNode),
    Array(ArrayNode),
}

impl ConfigNode {
    /// Shorthand for a leaf holding `value`.
    pub fn leaf(value: impl Into<String>) -> Self {
        Self::Leaf(LeafNode::new(value))
    }

    /// An empty map, the root of an empty configuration.
    pub fn empty_map() -> Self {
        Self::Map(MapNode::new())
    }

    /// Builds a map from `(key, node)` pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, ConfigNode)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds an array.
    pub fn array(items: Vec<ConfigNode>) -> Self {
        Self::Array(ArrayNode::new(items))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Leaf(_) => NodeKind::Leaf,
            Self::Map(_) => NodeKind::Map,
            Self::Array(_) => NodeKind::Array,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapNode> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayNode> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Follows `tokens` from this node.
    ///
    /// Tag tokens are skipped; they scope a query instead of descending.
    ///
    /// # Errors
    ///
    /// Returns a `NoNodeFound` issue naming the deepest path that could not
    /// be resolved.
    pub fn navigate(&self, tokens: &[PathToken]) -> Result<&ConfigNode, ValidationIssue> {
        let mut current = self;
        let mut walked: Vec<PathToken> = Vec::with_capacity(tokens.len());

        for token in tokens {
            walked.push(token.clone());
            let next = match (token, current) {
                (PathToken::Tag { .. }, _) => continue,
                (PathToken::Object(name), ConfigNode::Map(map)) => map.get(name),
                (PathToken::Array(index), ConfigNode::Array(array)) => array.get(*index),
                _ => None,
            };

            current = next.ok_or_else(|| {
                let path = render_path(&walked);
                ValidationIssue::error(
                    IssueKind::NoNodeFound,
                    path.clone(),
                    format!("No node found on path: {}", path),
                )
            })?;
        }

        Ok(current)
    }

    /// Rebuilds the tree with every map key normalized.
    ///
    /// Keys that collapse into the same normalized key are merged in key
    /// order, later keys winning, and reported as `DuplicateKey` warnings.
    pub fn normalized(self, normalizer: &dyn SentenceNormalizer, path: &str) -> Validated<Self> {
        let mut issues = Vec::new();
        let node = normalize_node(self, normalizer, path, &mut issues);
        Validated::with_issues(node, issues)
    }

    /// Renders the tree for debugging.
    ///
    /// Values of secret leaves (by metadata, by decorator, or because
    /// `is_secret_path` matches their path) are masked. Decorated payloads
    /// are never read, so rendering does not spend access budgets.
    pub fn render_masked(&self, is_secret_path: &dyn Fn(&str) -> bool) -> String {
        let mut out = String::new();
        render_node(self, "", 0, is_secret_path, &mut out);
        out
    }
}

fn normalize_node(
    node: ConfigNode,
    normalizer: &dyn SentenceNormalizer,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> ConfigNode {
    match node {
        ConfigNode::Leaf(leaf) => ConfigNode::Leaf(leaf),
        ConfigNode::Array(array) => ConfigNode::array(
            array
                .into_items()
                .into_iter()
                .enumerate()
                .map(|(i, item)| normalize_node(item, normalizer, &join_index(path, i), issues))
                .collect(),
        ),
        ConfigNode::Map(map) => {
            let mut normalized = MapNode::new();
            for (key, child) in map {
                let normal_key = normalizer.normalize(&key);
                let child_path = join_key(path, &normal_key);
                let child = normalize_node(child, normalizer, &child_path, issues);
                match normalized.remove(&normal_key) {
                    Some(existing) => {
                        issues.push(ValidationIssue::warn(
                            IssueKind::DuplicateKey,
                            child_path.clone(),
                            format!(
                                "Key '{}' collides with another key after normalization",
                                key
                            ),
                        ));
                        let merged = crate::merge::TreeMerger::new().merge(
                            existing,
                            child,
                            &child_path,
                        );
                        if let Some(node) = merged.absorb_into(issues) {
                            normalized.insert(normal_key, node);
                        }
                    }
                    None => {
                        normalized.insert(normal_key, child);
                    }
                }
            }
            ConfigNode::Map(normalized)
        }
    }
}

fn render_node(
    node: &ConfigNode,
    path: &str,
    indent: usize,
    is_secret_path: &dyn Fn(&str) -> bool,
    out: &mut String,
) {
    let pad = "  ".repeat(indent);
    match node {
        ConfigNode::Leaf(leaf) => {
            let shown = if leaf.is_secret() || is_secret_path(path) {
                "'*****'".to_string()
            } else {
                match leaf.plain_value() {
                    Some(value) => format!("'{}'", value),
                    None => "null".to_string(),
                }
            };
            out.push_str(&shown);
            out.push('\n');
        }
        ConfigNode::Map(map) => {
            out.push_str("{\n");
            for (key, child) in map.iter() {
                out.push_str(&format!("{}  {}: ", pad, key));
                render_node(child, &join_key(path, key), indent + 1, is_secret_path, out);
            }
            out.push_str(&format!("{}}}\n", pad));
        }
        ConfigNode::Array(array) => {
            out.push_str("[\n");
            for (i, item) in array.iter().enumerate() {
                out.push_str(&format!("{}  {}: ", pad, i));
                render_node(item, &join_index(path, i), indent + 1, is_secret_path, out);
            }
            out.push_str(&format!("{}]\n", pad));
        }
    }
}
