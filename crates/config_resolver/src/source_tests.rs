//! Tests for source fetching.

use super::*;

struct StubSource {
    id: SourceId,
    pairs: Option<Result<Vec<(String, String)>, SourceError>>,
    stream: Option<(String, Result<Vec<u8>, SourceError>)>,
}

impl StubSource {
    fn empty() -> Self {
        Self {
            id: SourceId::new(),
            pairs: None,
            stream: None,
        }
    }
}

#[async_trait]
impl ConfigSource for StubSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn format(&self) -> Option<&str> {
        self.stream.as_ref().map(|(format, _)| format.as_str())
    }

    fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    fn has_pairs(&self) -> bool {
        self.pairs.is_some()
    }

    async fn load_stream(&self) -> Result<Vec<u8>, SourceError> {
        self.stream.as_ref().map(|(_, r)| r.clone()).unwrap()
    }

    async fn load_pairs(&self) -> Result<Vec<(String, String)>, SourceError> {
        self.pairs.clone().unwrap()
    }
}

/// Reads `key=value` lines.
struct LineLoader;

impl FormatLoader for LineLoader {
    fn name(&self) -> &str {
        "lines"
    }

    fn accepts(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case("lines")
    }

    fn load(&self, content: &[u8]) -> Result<SourcePayload, SourceError> {
        let text = std::str::from_utf8(content).map_err(|e| SourceError::ParseFailed {
            format: "lines".to_string(),
            reason: e.to_string(),
        })?;
        Ok(SourcePayload::Pairs(
            text.lines()
                .filter_map(|l| l.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }
}

fn loaders() -> LoaderRegistry {
    let mut registry = LoaderRegistry::new();
    registry.register(Arc::new(LineLoader));
    registry
}

// ============================================================================
// Capabilities
// ============================================================================

/// Verify pairs are preferred over a byte stream.
#[tokio::test]
async fn test_pairs_take_precedence() {
    let source = StubSource {
        pairs: Some(Ok(vec![("a".to_string(), "pairs".to_string())])),
        stream: Some(("lines".to_string(), Ok(b"a=stream".to_vec()))),
        ..StubSource::empty()
    };

    let result = fetch_payload(&source, &loaders()).await;

    assert_eq!(
        result.value,
        Some(SourcePayload::Pairs(vec![("a".to_string(), "pairs".to_string())]))
    );
}

#[tokio::test]
async fn test_stream_is_parsed_by_loader() {
    let source = StubSource {
        stream: Some(("LINES".to_string(), Ok(b"a=1\nb=2".to_vec()))),
        ..StubSource::empty()
    };

    let result = fetch_payload(&source, &loaders()).await;

    let Some(SourcePayload::Pairs(pairs)) = result.value else {
        panic!("expected pairs");
    };
    assert_eq!(pairs.len(), 2);
}

/// Verify a source without capabilities is unsupported.
#[tokio::test]
async fn test_source_without_capabilities() {
    let result = fetch_payload(&StubSource::empty(), &loaders()).await;

    assert!(result.value.is_none());
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].kind, IssueKind::UnsupportedSource);
}

// ============================================================================
// Failures
// ============================================================================

/// Verify connector and loader failures become one issue naming the source.
#[tokio::test]
async fn test_failures_become_single_issue() {
    let failing = StubSource {
        pairs: Some(Err(SourceError::ReadFailed {
            name: "stub".to_string(),
            reason: "timeout".to_string(),
        })),
        ..StubSource::empty()
    };
    let unknown_format = StubSource {
        stream: Some(("yaml".to_string(), Ok(Vec::new()))),
        ..StubSource::empty()
    };

    for source in [failing, unknown_format] {
        let result = fetch_payload(&source, &loaders()).await;

        assert!(result.value.is_none());
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].kind, IssueKind::SourceLoadFailure);
        assert!(result.issues[0].message.contains("'stub'"));
    }
}

#[test]
fn test_source_ids_are_unique() {
    assert_ne!(SourceId::new(), SourceId::new());
}
