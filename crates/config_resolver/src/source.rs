//! Configuration sources and format loaders.
//!
//! A [`ConfigSource`] delivers one fragment of configuration, either as raw
//! bytes in some format or directly as `(path, value)` pairs. Raw bytes are
//! turned into a [`SourcePayload`] by the [`FormatLoader`] registered for the
//! source's format. Concrete sources and loaders live outside this crate; the
//! resolver only depends on these traits.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::node::ConfigNode;
use crate::tags::Tags;
use crate::validation::{IssueKind, Validated, ValidationIssue};

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;

/// Identifies a registered source for the lifetime of a resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(Uuid);

impl SourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The content of a source once loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    /// A structured tree, as produced by a format loader.
    Tree(ConfigNode),
    /// Flat `(path, value)` pairs.
    Pairs(Vec<(String, String)>),
}

/// Errors raised by sources and format loaders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Failed to read source '{name}': {reason}")]
    ReadFailed { name: String, reason: String },

    #[error("Failed to parse {format} content: {reason}")]
    ParseFailed { format: String, reason: String },

    #[error("No loader registered for format '{format}'")]
    NoLoaderForFormat { format: String },

    #[error("Source '{name}' does not support {capability}")]
    Unsupported { name: String, capability: String },
}

/// A provider of configuration content.
///
/// A source offers raw bytes (`has_stream`), pairs (`has_pairs`), or both.
/// Pairs take precedence when both are offered.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    fn id(&self) -> SourceId;

    /// A human readable name used in diagnostics.
    fn name(&self) -> &str;

    /// The format of the byte stream, such as `json` or `toml`.
    fn format(&self) -> Option<&str> {
        None
    }

    fn tags(&self) -> Tags {
        Tags::new()
    }

    fn has_stream(&self) -> bool {
        false
    }

    fn has_pairs(&self) -> bool {
        false
    }

    async fn load_stream(&self) -> Result<Vec<u8>, SourceError> {
        Err(SourceError::Unsupported {
            name: self.name().to_string(),
            capability: "byte streams".to_string(),
        })
    }

    async fn load_pairs(&self) -> Result<Vec<(String, String)>, SourceError> {
        Err(SourceError::Unsupported {
            name: self.name().to_string(),
            capability: "key/value pairs".to_string(),
        })
    }
}

/// Parses the byte stream of a source into a payload.
pub trait FormatLoader: Send + Sync {
    fn name(&self) -> &str;

    /// Returns `true` if this loader handles `format`.
    fn accepts(&self, format: &str) -> bool;

    fn load(&self, content: &[u8]) -> Result<SourcePayload, SourceError>;
}

/// Format loaders, tried in registration order.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn FormatLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, loader: Arc<dyn FormatLoader>) {
        self.loaders.push(loader);
    }

    pub fn find(&self, format: &str) -> Option<&Arc<dyn FormatLoader>> {
        self.loaders.iter().find(|loader| loader.accepts(format))
    }

    /// Parses `content` with the first loader accepting `format`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::NoLoaderForFormat` if no loader accepts the
    /// format, or the loader's own error.
    pub fn load(&self, format: &str, content: &[u8]) -> Result<SourcePayload, SourceError> {
        self.find(format)
            .ok_or_else(|| SourceError::NoLoaderForFormat {
                format: format.to_string(),
            })?
            .load(content)
    }
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.loaders.iter().map(|l| l.name()).collect();
        f.debug_struct("LoaderRegistry")
            .field("loaders", &names)
            .finish()
    }
}

/// Fetches a source's payload.
///
/// Any failure is reported as a single `ERROR` issue naming the source: a
/// source with neither capability gives `UnsupportedSource`, everything else
/// gives `SourceLoadFailure`.
pub async fn fetch_payload(
    source: &dyn ConfigSource,
    loaders: &LoaderRegistry,
) -> Validated<SourcePayload> {
    let name = source.name();

    if source.has_pairs() {
        return match source.load_pairs().await {
            Ok(pairs) => Validated::ok(SourcePayload::Pairs(pairs)),
            Err(e) => Validated::failed(load_failure(name, &e)),
        };
    }

    if source.has_stream() {
        let Some(format) = source.format() else {
            return Validated::failed(load_failure(
                name,
                &SourceError::NoLoaderForFormat {
                    format: "<unspecified>".to_string(),
                },
            ));
        };
        let loaded = match source.load_stream().await {
            Ok(content) => loaders.load(format, &content),
            Err(e) => Err(e),
        };
        return match loaded {
            Ok(payload) => Validated::ok(payload),
            Err(e) => Validated::failed(load_failure(name, &e)),
        };
    }

    Validated::failed(ValidationIssue::error(
        IssueKind::UnsupportedSource,
        "",
        format!(
            "Source '{}' offers neither a byte stream nor key/value pairs",
            name
        ),
    ))
}

fn load_failure(name: &str, error: &SourceError) -> ValidationIssue {
    ValidationIssue::error(
        IssueKind::SourceLoadFailure,
        "",
        format!("Failed to load source '{}': {}", name, error),
    )
}
