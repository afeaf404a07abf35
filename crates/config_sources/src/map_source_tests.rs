//! Tests for the in-memory source.

use super::*;

/// Verify the pairs are served unchanged.
#[tokio::test]
async fn test_load_pairs() {
    let source = MapSource::new("defaults", [("db.port", "5432"), ("db.host", "localhost")]);

    let pairs = source.load_pairs().await.unwrap();

    assert_eq!(
        pairs,
        vec![
            ("db.port".to_string(), "5432".to_string()),
            ("db.host".to_string(), "localhost".to_string()),
        ]
    );
    assert!(source.has_pairs());
    assert!(!source.has_stream());
    assert!(source.tags().is_empty());
}

/// Verify tags are reported and each source gets its own id.
#[test]
fn test_tags_and_ids() {
    let prod = MapSource::new("prod", [("a", "1")]).with_tags(Tags::of([("env", "prod")]));
    let other = MapSource::new("prod", [("a", "1")]);

    assert_eq!(prod.tags(), Tags::of([("env", "prod")]));
    assert_ne!(prod.id(), other.id());
    assert_eq!(prod.name(), "prod");
}
