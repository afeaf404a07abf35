//! Byte stream sources: files on disk and in-memory text.

use async_trait::async_trait;
use config_resolver::{ConfigSource, SourceError, SourceId, Tags};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "file_source_tests.rs"]
mod tests;

/// A source reading a file on every load.
///
/// The format is taken from the file extension unless set explicitly.
#[derive(Debug, Clone)]
pub struct FileSource {
    id: SourceId,
    name: String,
    path: PathBuf,
    format: Option<String>,
    tags: Tags,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = format_from_extension(&path);
        Self {
            id: SourceId::new(),
            name: path.display().to_string(),
            path,
            format,
            tags: Tags::new(),
        }
    }

    /// Overrides the format derived from the extension.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Lower-cased file extension, if any.
pub(crate) fn format_from_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

#[async_trait]
impl ConfigSource for FileSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    fn tags(&self) -> Tags {
        self.tags.clone()
    }

    fn has_stream(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load_stream(&self) -> Result<Vec<u8>, SourceError> {
        let content = tokio::fs::read(&self.path)
            .await
            .map_err(|e| SourceError::ReadFailed {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;
        debug!("Read {} byte(s)", content.len());
        Ok(content)
    }
}

/// A source serving text held in memory, in a named format.
#[derive(Debug, Clone)]
pub struct StringSource {
    id: SourceId,
    name: String,
    format: String,
    content: String,
    tags: Tags,
}

impl StringSource {
    pub fn new(
        name: impl Into<String>,
        format: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: SourceId::new(),
            name: name.into(),
            format: format.into(),
            content: content.into(),
            tags: Tags::new(),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

#[async_trait]
impl ConfigSource for StringSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> Option<&str> {
        Some(&self.format)
    }

    fn tags(&self) -> Tags {
        self.tags.clone()
    }

    fn has_stream(&self) -> bool {
        true
    }

    async fn load_stream(&self) -> Result<Vec<u8>, SourceError> {
        Ok(self.content.as_bytes().to_vec())
    }
}
