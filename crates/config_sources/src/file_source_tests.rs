//! Tests for file and string sources.

use super::*;
use std::fs;
use tempfile::TempDir;

/// Verify the file content is read and the format comes from the extension.
#[tokio::test]
async fn test_file_source_reads_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("app.JSON");
    fs::write(&path, r#"{"db": {"port": 5432}}"#).expect("Failed to write file");

    let source = FileSource::new(&path);

    assert_eq!(source.format(), Some("json"));
    assert!(source.has_stream());
    assert!(!source.has_pairs());
    assert_eq!(
        source.load_stream().await.unwrap(),
        br#"{"db": {"port": 5432}}"#.to_vec()
    );
}

/// Verify a missing file reports a read failure naming the file.
#[tokio::test]
async fn test_file_source_missing_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("missing.toml");

    let err = FileSource::new(&path).load_stream().await.unwrap_err();

    match err {
        SourceError::ReadFailed { name, .. } => assert!(name.ends_with("missing.toml")),
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Verify an explicit format overrides the extension.
#[test]
fn test_file_source_format_override() {
    let source = FileSource::new("settings.conf").with_format("properties");
    assert_eq!(source.format(), Some("properties"));

    let bare = FileSource::new("settings");
    assert_eq!(bare.format(), None);
}

/// Verify the string source serves its text in its format.
#[tokio::test]
async fn test_string_source() {
    let source = StringSource::new("inline", "toml", "port = 80")
        .with_tags(Tags::of([("env", "dev")]));

    assert_eq!(source.format(), Some("toml"));
    assert_eq!(source.tags(), Tags::of([("env", "dev")]));
    assert_eq!(source.load_stream().await.unwrap(), b"port = 80".to_vec());
}
