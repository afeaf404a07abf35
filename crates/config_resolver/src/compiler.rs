//! Tree compiler.
//!
//! Turns one source's flat `(tokens, value)` pairs into a tree. The compiler
//! groups fragments by the token found at each depth, so the resulting
//! structure depends only on the set of fragments, never on their order.
//!
//! Structural problems are reported as issues. An error drops only the
//! smallest subtree it affects: a broken map entry is left out while its
//! siblings compile, and a broken array element drops the whole array since
//! keeping the rest would leave a gap.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::lexer::{join_index, join_key, PathLexer, PathToken, TokenKind};
use crate::node::{ConfigNode, MapNode};
use crate::tags::{Tag, Tags};
use crate::validation::{IssueKind, Validated, ValidationIssue};

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod tests;

/// A lexed path and the raw value assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFragment {
    pub tokens: Vec<PathToken>,
    pub value: String,
}

impl PathFragment {
    pub fn new(tokens: Vec<PathToken>, value: impl Into<String>) -> Self {
        Self {
            tokens,
            value: value.into(),
        }
    }
}

/// Builds configuration trees from path fragments.
///
/// Stateless; a single instance can be shared freely.
///
/// # Examples
///
/// ```rust
/// use config_resolver::{PathLexer, Tags, TreeCompiler};
///
/// let lexer = PathLexer::new();
/// let pairs = vec![
///     ("db.hosts[0].user".to_string(), "a".to_string()),
///     ("db.hosts[1].user".to_string(), "b".to_string()),
/// ];
///
/// let result = TreeCompiler::new().compile_pairs(&lexer, &pairs, &Tags::new(), "inline");
/// let trees = result.value.unwrap();
/// assert!(trees.contains_key(&Tags::new()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TreeCompiler {}

impl TreeCompiler {
    pub fn new() -> Self {
        Self {}
    }

    /// Compiles fragments into a single tree.
    ///
    /// `source_name` is only used for diagnostics.
    pub fn compile(&self, fragments: &[PathFragment], source_name: &str) -> Validated<ConfigNode> {
        debug!(
            "Compiling {} fragment(s) from source '{}'",
            fragments.len(),
            source_name
        );

        if fragments.is_empty() {
            return Validated::ok(ConfigNode::empty_map());
        }

        let refs: Vec<&PathFragment> = fragments.iter().collect();
        let mut issues = Vec::new();
        let node = build_node(&refs, 0, "", &mut issues);
        Validated {
            value: node,
            issues,
        }
    }

    /// Lexes raw pairs and compiles them, one tree per tag set.
    ///
    /// Pairs whose path carries tag tokens are moved into the batch for
    /// `tags` plus those tag tokens; everything else lands in the batch for
    /// `tags`. Pairs whose path fails to lex are reported and skipped.
    pub fn compile_pairs(
        &self,
        lexer: &PathLexer,
        pairs: &[(String, String)],
        tags: &Tags,
        source_name: &str,
    ) -> Validated<BTreeMap<Tags, ConfigNode>> {
        let mut issues = Vec::new();
        let mut batches: BTreeMap<Tags, Vec<PathFragment>> = BTreeMap::new();
        batches.insert(tags.clone(), Vec::new());

        for (path, value) in pairs {
            let lexed = lexer.tokenize(path);
            let failed = lexed.has_errors(false);
            let Some(tokens) = lexed.absorb_into(&mut issues) else {
                continue;
            };
            if failed || tokens.is_empty() {
                continue;
            }

            let mut scope = tags.clone();
            let mut descent = Vec::with_capacity(tokens.len());
            for token in tokens {
                match token {
                    PathToken::Tag { key, value } => scope.insert(Tag::new(key, value)),
                    other => descent.push(other),
                }
            }
            if descent.is_empty() {
                issues.push(ValidationIssue::error(
                    IssueKind::EmptyPath,
                    path.as_str(),
                    format!("Path '{}' only contains tags", path),
                ));
                continue;
            }

            batches
                .entry(scope)
                .or_default()
                .push(PathFragment::new(descent, value.as_str()));
        }

        let mut trees = BTreeMap::new();
        for (scope, fragments) in batches {
            let compiled = self.compile(&fragments, source_name);
            if let Some(tree) = compiled.absorb_into(&mut issues) {
                trees.insert(scope, tree);
            }
        }

        Validated::with_issues(trees, issues)
    }
}

fn build_node(
    fragments: &[&PathFragment],
    depth: usize,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<ConfigNode> {
    let (ends_here, continues): (Vec<&PathFragment>, Vec<&PathFragment>) = fragments
        .iter()
        .copied()
        .partition(|f| f.tokens.len() == depth);

    if !ends_here.is_empty() {
        if !continues.is_empty() {
            issues.push(ValidationIssue::error(
                IssueKind::LeafNonLeafConflict,
                path,
                format!("Path '{}' is defined both as a value and as a container", path),
            ));
            return None;
        }
        if ends_here.len() > 1 {
            issues.push(ValidationIssue::error(
                IssueKind::DuplicateLeaf,
                path,
                format!(
                    "Path '{}' is defined {} times in the same source",
                    path,
                    ends_here.len()
                ),
            ));
            return None;
        }
        return Some(ConfigNode::leaf(ends_here[0].value.clone()));
    }

    let kinds: BTreeSet<TokenKind> = continues.iter().map(|f| f.tokens[depth].kind()).collect();
    if kinds.len() > 1 {
        let rendered: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
        issues.push(ValidationIssue::error(
            IssueKind::MixedTokenKinds,
            path,
            format!(
                "Path '{}' mixes token kinds: {}",
                path,
                rendered.join(", ")
            ),
        ));
        return None;
    }

    match kinds.into_iter().next() {
        Some(TokenKind::Object) => Some(build_map(&continues, depth, path, issues)),
        Some(TokenKind::Array) => build_array(&continues, depth, path, issues),
        Some(kind) => {
            issues.push(ValidationIssue::error(
                IssueKind::UnsupportedToken,
                path,
                format!("Token kind '{}' cannot form a node at '{}'", kind, path),
            ));
            None
        }
        None => None,
    }
}

fn build_map(
    fragments: &[&PathFragment],
    depth: usize,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> ConfigNode {
    let mut groups: BTreeMap<&str, Vec<&PathFragment>> = BTreeMap::new();
    for fragment in fragments {
        if let PathToken::Object(name) = &fragment.tokens[depth] {
            groups.entry(name.as_str()).or_default().push(fragment);
        }
    }

    let mut map = MapNode::new();
    for (name, group) in groups {
        if let Some(child) = build_node(&group, depth + 1, &join_key(path, name), issues) {
            map.insert(name, child);
        }
    }
    ConfigNode::Map(map)
}

fn build_array(
    fragments: &[&PathFragment],
    depth: usize,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<ConfigNode> {
    let mut groups: BTreeMap<usize, Vec<&PathFragment>> = BTreeMap::new();
    for fragment in fragments {
        if let PathToken::Array(index) = fragment.tokens[depth] {
            groups.entry(index).or_default().push(fragment);
        }
    }

    let max = groups.keys().next_back().copied()?;
    let missing: Vec<usize> = (0..=max).filter(|i| !groups.contains_key(i)).collect();
    for index in &missing {
        issues.push(ValidationIssue::error(
            IssueKind::MissingArrayIndex,
            join_index(path, *index),
            format!(
                "Array '{}' is missing index {} of 0..={}",
                path, index, max
            ),
        ));
    }

    let mut items = Vec::with_capacity(groups.len());
    let mut complete = missing.is_empty();
    for (index, group) in groups {
        match build_node(&group, depth + 1, &join_index(path, index), issues) {
            Some(child) => items.push(child),
            None => complete = false,
        }
    }

    complete.then(|| ConfigNode::array(items))
}
