//! Tests for configuration tree nodes.

use super::*;
use crate::lexer::{LowerCaseNormalizer, PathLexer};

fn sample_tree() -> ConfigNode {
    ConfigNode::map([(
        "db",
        ConfigNode::map([
            (
                "hosts",
                ConfigNode::array(vec![
                    ConfigNode::map([("user", ConfigNode::leaf("a"))]),
                    ConfigNode::map([("user", ConfigNode::leaf("b"))]),
                ]),
            ),
            ("password", ConfigNode::leaf("hunter2")),
        ]),
    )])
}

// ============================================================================
// Navigation
// ============================================================================

/// Verify navigation through maps and arrays.
#[test]
fn test_navigate_resolves_nested_path() {
    let tree = sample_tree();
    let tokens = PathLexer::new().tokenize("db.hosts[1].user").value.unwrap();

    let node = tree.navigate(&tokens).unwrap();

    assert_eq!(node.as_leaf().unwrap().value().as_deref(), Some("b"));
}

/// Verify a missing intermediate node is reported with the deepest path.
#[test]
fn test_navigate_missing_node() {
    let tree = sample_tree();
    let tokens = PathLexer::new().tokenize("db.replica.host").value.unwrap();

    let issue = tree.navigate(&tokens).unwrap_err();

    assert_eq!(issue.kind, IssueKind::NoNodeFound);
    assert_eq!(issue.path, "db.replica");
}

/// Verify out-of-range indices and kind mismatches are not found.
#[test]
fn test_navigate_index_out_of_range_and_wrong_kind() {
    let tree = sample_tree();
    let lexer = PathLexer::new();

    let out_of_range = lexer.tokenize("db.hosts[5]").value.unwrap();
    let index_on_map = lexer.tokenize("db[0]").value.unwrap();

    assert_eq!(tree.navigate(&out_of_range).unwrap_err().path, "db.hosts[5]");
    assert_eq!(tree.navigate(&index_on_map).unwrap_err().path, "db[0]");
}

/// Verify tag tokens do not descend.
#[test]
fn test_navigate_skips_tags() {
    let tree = sample_tree();
    let tokens = PathLexer::new()
        .tokenize("@env=prod.db.password")
        .value
        .unwrap();

    assert!(tree.navigate(&tokens).is_ok());
}

// ============================================================================
// Leaves and metadata
// ============================================================================

#[test]
fn test_leaf_metadata_flags() {
    let leaf = LeafNode::new("v")
        .with_metadata(meta_keys::SECRET, vec![MetaValue::Flag(true)])
        .with_metadata(meta_keys::TEMPORARY, vec![MetaValue::Count(2), MetaValue::Count(4)]);

    assert!(leaf.has_flag(meta_keys::SECRET));
    assert!(!leaf.has_flag(meta_keys::NO_CACHE));
    assert_eq!(leaf.max_count(meta_keys::TEMPORARY), Some(4));
    assert!(leaf.is_secret());
    assert!(leaf.is_uncacheable());
}

#[test]
fn test_plain_leaf_is_cacheable() {
    let leaf = LeafNode::new("v");

    assert!(!leaf.is_secret());
    assert!(!leaf.is_uncacheable());
    assert_eq!(leaf.plain_value(), Some("v"));
}

/// Verify cloned trees share a temporary decorator's budget.
#[test]
fn test_clones_share_decorator_state() {
    let temporary = Arc::new(TemporaryValue::new(
        LeafPayload::Plain(Some("once".to_string())),
        1,
    ));
    let leaf = ConfigNode::Leaf(LeafNode::from_payload(
        LeafPayload::Temporary(temporary),
        Metadata::new(),
    ));
    let copy = leaf.clone();

    assert_eq!(leaf, copy);
    assert_eq!(leaf.as_leaf().unwrap().value().as_deref(), Some("once"));
    assert_eq!(copy.as_leaf().unwrap().value(), None);
}

// ============================================================================
// Normalization and rendering
// ============================================================================

/// Verify keys are normalized and collisions merge with a warning.
#[test]
fn test_normalized_merges_colliding_keys() {
    let tree = ConfigNode::map([
        ("DB", ConfigNode::map([("Host", ConfigNode::leaf("a"))])),
        ("db", ConfigNode::map([("port", ConfigNode::leaf("5432"))])),
    ]);

    let result = tree.normalized(&LowerCaseNormalizer, "");

    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].kind, IssueKind::DuplicateKey);
    let db = result.value.unwrap();
    let db = db.as_map().unwrap().get("db").unwrap().as_map().unwrap();
    assert!(db.contains_key("host"));
    assert!(db.contains_key("port"));
}

/// Verify secrets are masked and decorators are not read while rendering.
#[test]
fn test_render_masked() {
    let temporary = Arc::new(TemporaryValue::new(
        LeafPayload::Plain(Some("tok".to_string())),
        1,
    ));
    let tree = ConfigNode::map([
        ("password", ConfigNode::leaf("hunter2")),
        ("host", ConfigNode::leaf("localhost")),
        (
            "token",
            ConfigNode::Leaf(LeafNode::from_payload(
                LeafPayload::Temporary(Arc::clone(&temporary)),
                Metadata::new(),
            )),
        ),
    ]);

    let rendered = tree.render_masked(&|path| path.contains("password"));

    assert!(rendered.contains("host: 'localhost'"));
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("tok'"));
    assert_eq!(temporary.remaining(), 1);
}
