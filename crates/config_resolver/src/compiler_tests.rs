//! Tests for the tree compiler.

use super::*;

fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn fragments(entries: &[(&str, &str)]) -> Vec<PathFragment> {
    let lexer = PathLexer::new();
    entries
        .iter()
        .map(|(path, value)| PathFragment::new(lexer.tokenize(path).value.unwrap(), *value))
        .collect()
}

fn leaf_at(tree: &ConfigNode, path: &str) -> Option<String> {
    let tokens = PathLexer::new().tokenize(path).value.unwrap();
    tree.navigate(&tokens).ok()?.as_leaf()?.value()
}

// ============================================================================
// Structure
// ============================================================================

/// Verify the hosts scenario compiles to an array of two maps.
#[test]
fn test_compile_array_of_maps() {
    let input = fragments(&[("db.hosts[0].user", "a"), ("db.hosts[1].user", "b")]);

    let result = TreeCompiler::new().compile(&input, "test");

    assert!(result.issues.is_empty());
    let tree = result.value.unwrap();
    let hosts = tree
        .as_map()
        .and_then(|m| m.get("db"))
        .and_then(|n| n.as_map())
        .and_then(|m| m.get("hosts"))
        .and_then(|n| n.as_array())
        .unwrap();
    assert_eq!(hosts.len(), 2);
    assert!(hosts.iter().all(|h| h.kind() == crate::node::NodeKind::Map));
    assert_eq!(leaf_at(&tree, "db.hosts[0].user").as_deref(), Some("a"));
    assert_eq!(leaf_at(&tree, "db.hosts[1].user").as_deref(), Some("b"));
}

/// Verify compilation is independent of fragment order.
#[test]
fn test_compile_is_order_independent() {
    let entries = [
        ("db.hosts[1].user", "b"),
        ("db.port", "5432"),
        ("db.hosts[0].user", "a"),
        ("app.name", "svc"),
        ("db.hosts[0].port", "1"),
    ];
    let forward = fragments(&entries);
    let mut reversed = forward.clone();
    reversed.reverse();
    let mut rotated = forward.clone();
    rotated.rotate_left(2);

    let compiler = TreeCompiler::new();
    let a = compiler.compile(&forward, "test").value.unwrap();
    let b = compiler.compile(&reversed, "test").value.unwrap();
    let c = compiler.compile(&rotated, "test").value.unwrap();

    assert_eq!(a, b);
    assert_eq!(a, c);
    // Compiling the same batch twice is stable too.
    assert_eq!(a, compiler.compile(&forward, "test").value.unwrap());
}

/// Verify an empty batch compiles to an empty map.
#[test]
fn test_compile_empty_batch() {
    let result = TreeCompiler::new().compile(&[], "test");

    assert_eq!(result.value.unwrap(), ConfigNode::empty_map());
}

// ============================================================================
// Conflicts
// ============================================================================

/// Verify a gap in an array yields exactly one missing-index issue.
#[test]
fn test_array_gap_reports_single_missing_index() {
    let input = fragments(&[("list[0]", "a"), ("list[2]", "c"), ("other", "x")]);

    let result = TreeCompiler::new().compile(&input, "test");

    let missing: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.kind == IssueKind::MissingArrayIndex)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].path, "list[1]");

    // The broken array is dropped, its sibling survives.
    let tree = result.value.unwrap();
    assert!(tree.as_map().unwrap().get("list").is_none());
    assert_eq!(leaf_at(&tree, "other").as_deref(), Some("x"));
}

/// Verify a path that is both a leaf and a container is rejected.
#[test]
fn test_leaf_non_leaf_conflict() {
    let input = fragments(&[("a.b[0]", "x"), ("a.b", "y"), ("a.c", "z")]);

    let result = TreeCompiler::new().compile(&input, "test");

    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].kind, IssueKind::LeafNonLeafConflict);
    assert_eq!(result.issues[0].path, "a.b");
    assert!(result.has_errors(false));

    let tree = result.value.unwrap();
    assert_eq!(leaf_at(&tree, "a.c").as_deref(), Some("z"));
    assert!(leaf_at(&tree, "a.b").is_none());
}

/// Verify two fragments for the same array slot are rejected.
#[test]
fn test_duplicate_array_leaf() {
    let input = fragments(&[("list[0]", "a"), ("LIST[0]", "b")]);

    let result = TreeCompiler::new().compile(&input, "test");

    assert_eq!(result.issues[0].kind, IssueKind::DuplicateLeaf);
    assert_eq!(result.issues[0].path, "list[0]");
}

/// Verify mixing object and array tokens at one depth is rejected.
#[test]
fn test_mixed_token_kinds() {
    let input = vec![
        PathFragment::new(vec![PathToken::Object("a".into()), PathToken::Array(0)], "x"),
        PathFragment::new(
            vec![PathToken::Object("a".into()), PathToken::Object("b".into())],
            "y",
        ),
    ];

    let result = TreeCompiler::new().compile(&input, "test");

    assert_eq!(result.issues[0].kind, IssueKind::MixedTokenKinds);
    assert_eq!(result.issues[0].path, "a");
}

/// Verify tag tokens reaching the compiler are rejected.
#[test]
fn test_tag_token_is_unsupported() {
    let input = vec![PathFragment::new(
        vec![
            PathToken::Object("a".into()),
            PathToken::Tag {
                key: "env".into(),
                value: "prod".into(),
            },
        ],
        "x",
    )];

    let result = TreeCompiler::new().compile(&input, "test");

    assert_eq!(result.issues[0].kind, IssueKind::UnsupportedToken);
}

// ============================================================================
// compile_pairs
// ============================================================================

/// Verify tag tokens route pairs into tagged trees.
#[test]
fn test_compile_pairs_routes_tagged_pairs() {
    let input = pairs(&[("db.host", "localhost"), ("@env=prod.db.host", "prod-db")]);

    let result = TreeCompiler::new().compile_pairs(&PathLexer::new(), &input, &Tags::new(), "t");

    assert!(result.issues.is_empty());
    let trees = result.value.unwrap();
    assert_eq!(trees.len(), 2);
    assert_eq!(
        leaf_at(&trees[&Tags::new()], "db.host").as_deref(),
        Some("localhost")
    );
    assert_eq!(
        leaf_at(&trees[&Tags::of([("env", "prod")])], "db.host").as_deref(),
        Some("prod-db")
    );
}

/// Verify source tags are combined with tag tokens.
#[test]
fn test_compile_pairs_combines_source_tags() {
    let input = pairs(&[("@region=eu.cdn", "eu.example")]);
    let source_tags = Tags::of([("env", "prod")]);

    let trees = TreeCompiler::new()
        .compile_pairs(&PathLexer::new(), &input, &source_tags, "t")
        .value
        .unwrap();

    assert!(trees.contains_key(&Tags::of([("env", "prod"), ("region", "eu")])));
}

/// Verify lexing errors are reported and the pair is skipped.
#[test]
fn test_compile_pairs_skips_unlexable_paths() {
    let input = pairs(&[("db..host", "x"), ("db.port", "1")]);

    let result = TreeCompiler::new().compile_pairs(&PathLexer::new(), &input, &Tags::new(), "t");

    assert_eq!(result.issues[0].kind, IssueKind::EmptySegment);
    let trees = result.value.unwrap();
    assert_eq!(leaf_at(&trees[&Tags::new()], "db.port").as_deref(), Some("1"));
    assert!(leaf_at(&trees[&Tags::new()], "db.host").is_none());
}

/// Verify a huge array index yields one issue and no tree entry.
#[test]
fn test_compile_pairs_rejects_huge_index() {
    let input = pairs(&[("hosts[9223372036854775807]", "x"), ("db.port", "1")]);

    let result = TreeCompiler::new().compile_pairs(&PathLexer::new(), &input, &Tags::new(), "t");

    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].kind, IssueKind::InvalidArrayIndex);
    let trees = result.value.unwrap();
    assert!(leaf_at(&trees[&Tags::new()], "hosts").is_none());
    assert_eq!(leaf_at(&trees[&Tags::new()], "db.port").as_deref(), Some("1"));
}
