//! Include directives.
//!
//! A map entry whose key is the include keyword (`$include` by default) or
//! `keyword:<order>` loads another configuration and merges it into the map
//! holding the directive:
//!
//! ```text
//! $include   = source=file,path=/etc/app/shared.json
//! $include:2 = source=env,prefix=APP_
//! ```
//!
//! The value is a comma separated `key=value` list. The `source` parameter
//! selects a [`SourceFactory`]; the whole list is handed to that factory.
//!
//! Layers are merged in ascending order: a bare keyword has order `-1`, the
//! map's own entries have order `0`, and numbered directives use their
//! number. At equal order the map's own entries are applied last. Included
//! trees may include further trees, up to the configured depth.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::{NodeProcessor, Processed};
use crate::compiler::TreeCompiler;
use crate::lexer::{join_index, join_key, PathLexer};
use crate::merge::TreeMerger;
use crate::node::{ConfigNode, MapNode};
use crate::settings::IncludeSettings;
use crate::source::SourcePayload;
use crate::tags::Tags;
use crate::validation::{IssueKind, ValidationIssue};

#[cfg(test)]
#[path = "include_tests.rs"]
mod tests;

/// The parameter that names the source factory.
pub const SOURCE_KEY: &str = "source";

/// Errors raised while resolving an include directive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IncludeError {
    #[error("Include parameters do not name a source")]
    NoSourceKey,

    #[error("No source factory registered for '{source_name}'")]
    NoFactoryForSource { source_name: String },

    #[error("Failed to build source '{source_name}': {reason}")]
    BuildFailure { source_name: String, reason: String },
}

impl IncludeError {
    fn issue_kind(&self) -> IssueKind {
        match self {
            Self::NoSourceKey => IssueKind::NoSourceKey,
            Self::NoFactoryForSource { .. } => IssueKind::NoFactoryForSource,
            Self::BuildFailure { .. } => IssueKind::SourceBuildFailure,
        }
    }
}

/// Builds configuration payloads from include parameters.
///
/// Factories run synchronously while the pipeline executes.
pub trait SourceFactory: Send + Sync {
    /// The value of the `source` parameter this factory answers to.
    fn source_name(&self) -> &str;

    fn build(&self, parameters: &BTreeMap<String, String>) -> Result<Vec<SourcePayload>, IncludeError>;
}

/// Source factories by name.
#[derive(Clone, Default)]
pub struct SourceFactoryRegistry {
    factories: HashMap<String, Arc<dyn SourceFactory>>,
}

impl SourceFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory, replacing any factory with the same name.
    pub fn register(&mut self, factory: Arc<dyn SourceFactory>) {
        self.factories
            .insert(factory.source_name().to_lowercase(), factory);
    }

    pub fn contains(&self, source_name: &str) -> bool {
        self.factories.contains_key(&source_name.to_lowercase())
    }

    /// Builds the payloads named by `parameters`.
    ///
    /// # Errors
    ///
    /// Returns `IncludeError::NoSourceKey` without a `source` parameter,
    /// `IncludeError::NoFactoryForSource` for an unregistered source, and
    /// whatever the factory itself reports.
    pub fn resolve(
        &self,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Vec<SourcePayload>, IncludeError> {
        let source_name = parameters.get(SOURCE_KEY).ok_or(IncludeError::NoSourceKey)?;
        let factory = self
            .factories
            .get(&source_name.to_lowercase())
            .ok_or_else(|| IncludeError::NoFactoryForSource {
                source_name: source_name.clone(),
            })?;
        factory.build(parameters)
    }
}

impl std::fmt::Debug for SourceFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("SourceFactoryRegistry")
            .field("factories", &names)
            .finish()
    }
}

/// Parses `k=v,k2=v2`. Keys are lower-cased, both sides trimmed.
pub fn parse_parameters(raw: &str) -> Result<BTreeMap<String, String>, String> {
    let mut parameters = BTreeMap::new();
    for item in raw.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| format!("Parameter '{}' is not a key=value pair", item))?;
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return Err(format!("Parameter '{}' has an empty key", item));
        }
        parameters.insert(key, value.trim().to_string());
    }
    Ok(parameters)
}

enum Directive {
    NotADirective,
    Ordered(i64),
    Invalid,
}

/// Expands include directives.
#[derive(Debug, Clone)]
pub struct IncludeProcessor {
    keyword: String,
    max_depth: usize,
    lexer: PathLexer,
    factories: Arc<SourceFactoryRegistry>,
    compiler: TreeCompiler,
    merger: TreeMerger,
}

impl IncludeProcessor {
    pub fn new(
        settings: &IncludeSettings,
        lexer: PathLexer,
        factories: Arc<SourceFactoryRegistry>,
    ) -> Self {
        Self {
            keyword: lexer.normalize(&settings.keyword),
            max_depth: settings.max_depth,
            lexer,
            factories,
            compiler: TreeCompiler::new(),
            merger: TreeMerger::new(),
        }
    }

    fn directive(&self, key: &str) -> Directive {
        let Some(rest) = key.strip_prefix(self.keyword.as_str()) else {
            return Directive::NotADirective;
        };
        if rest.is_empty() {
            return Directive::Ordered(-1);
        }
        match rest.strip_prefix(':') {
            Some(order) => order
                .trim()
                .parse::<i64>()
                .map(Directive::Ordered)
                .unwrap_or(Directive::Invalid),
            None => Directive::NotADirective,
        }
    }

    /// Expands the directives of one map. Children are left as they are.
    fn expand_map(
        &self,
        map: MapNode,
        path: &str,
        depth: usize,
        issues: &mut Vec<ValidationIssue>,
    ) -> ConfigNode {
        let mut directives = Vec::new();
        let mut siblings = MapNode::new();
        for (key, child) in map {
            match self.directive(&key) {
                Directive::NotADirective => {
                    siblings.insert(key, child);
                }
                Directive::Ordered(order) => directives.push((order, key, child)),
                Directive::Invalid => issues.push(ValidationIssue::error(
                    IssueKind::InvalidInclude,
                    join_key(path, &key),
                    format!("Include key '{}' has an invalid order", key),
                )),
            }
        }

        if directives.is_empty() {
            return ConfigNode::Map(siblings);
        }
        if depth >= self.max_depth {
            warn!(
                "Include depth {} reached at '{}', dropping {} directive(s)",
                self.max_depth,
                path,
                directives.len()
            );
            issues.push(ValidationIssue::error(
                IssueKind::MaxNestedIncludes,
                path,
                format!("Includes are nested deeper than {} level(s)", self.max_depth),
            ));
            return ConfigNode::Map(siblings);
        }

        let mut layers: Vec<(i64, ConfigNode)> = Vec::new();
        for (order, key, child) in directives {
            let directive_path = join_key(path, &key);
            if let Some(tree) = self.load_directive(&directive_path, path, &child, depth, issues) {
                layers.push((order, tree));
            }
        }
        layers.push((0, ConfigNode::Map(siblings)));
        layers.sort_by_key(|(order, _)| *order);

        self.merger
            .merge_all(layers.into_iter().map(|(_, tree)| tree), path)
            .absorb_into(issues)
            .unwrap_or_else(ConfigNode::empty_map)
    }

    /// Loads one directive and expands the result one level deeper.
    fn load_directive(
        &self,
        directive_path: &str,
        target_path: &str,
        node: &ConfigNode,
        depth: usize,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<ConfigNode> {
        let Some(raw) = node.as_leaf().and_then(|leaf| leaf.plain_value()) else {
            issues.push(ValidationIssue::error(
                IssueKind::InvalidInclude,
                directive_path,
                "Include directive must be a value",
            ));
            return None;
        };

        let parameters = match parse_parameters(raw) {
            Ok(parameters) => parameters,
            Err(reason) => {
                issues.push(ValidationIssue::error(
                    IssueKind::InvalidInclude,
                    directive_path,
                    reason,
                ));
                return None;
            }
        };

        let payloads = match self.factories.resolve(&parameters) {
            Ok(payloads) => payloads,
            Err(e) => {
                issues.push(ValidationIssue::error(
                    e.issue_kind(),
                    directive_path,
                    e.to_string(),
                ));
                return None;
            }
        };

        debug!(
            "Including {} payload(s) at '{}' (depth {})",
            payloads.len(),
            target_path,
            depth + 1
        );

        let mut trees = Vec::with_capacity(payloads.len());
        for payload in payloads {
            if let Some(tree) = self.payload_tree(directive_path, target_path, payload, issues) {
                trees.push(self.expand_tree(tree, target_path, depth + 1, issues));
            }
        }

        self.merger
            .merge_all(trees, target_path)
            .absorb_into(issues)
    }

    fn payload_tree(
        &self,
        directive_path: &str,
        target_path: &str,
        payload: SourcePayload,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<ConfigNode> {
        match payload {
            SourcePayload::Tree(tree) => tree
                .normalized(self.lexer.normalizer(), target_path)
                .absorb_into(issues),
            SourcePayload::Pairs(pairs) => {
                let untagged = Tags::new();
                let mut trees = self
                    .compiler
                    .compile_pairs(&self.lexer, &pairs, &untagged, directive_path)
                    .absorb_into(issues)?;
                let tree = trees.remove(&untagged);
                for tags in trees.keys() {
                    issues.push(ValidationIssue::warn(
                        IssueKind::InvalidInclude,
                        directive_path,
                        format!("Ignoring entries tagged '{}' in included source", tags),
                    ));
                }
                tree
            }
        }
    }

    /// Expands directives everywhere in `node`.
    fn expand_tree(
        &self,
        node: ConfigNode,
        path: &str,
        depth: usize,
        issues: &mut Vec<ValidationIssue>,
    ) -> ConfigNode {
        match node {
            ConfigNode::Leaf(_) => node,
            ConfigNode::Map(map) => match self.expand_map(map, path, depth, issues) {
                ConfigNode::Map(expanded) => ConfigNode::Map(
                    expanded
                        .into_iter()
                        .map(|(key, child)| {
                            let child = self.expand_tree(child, &join_key(path, &key), depth, issues);
                            (key, child)
                        })
                        .collect(),
                ),
                other => other,
            },
            ConfigNode::Array(array) => ConfigNode::array(
                array
                    .into_items()
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| self.expand_tree(item, &join_index(path, i), depth, issues))
                    .collect(),
            ),
        }
    }
}

impl NodeProcessor for IncludeProcessor {
    fn name(&self) -> &str {
        "include"
    }

    fn process(&self, path: &str, node: ConfigNode) -> Processed {
        match node {
            ConfigNode::Map(map) => {
                let mut issues = Vec::new();
                let node = self.expand_map(map, path, 0, &mut issues);
                Processed::with_issues(node, issues)
            }
            other => Processed::unchanged(other),
        }
    }
}
