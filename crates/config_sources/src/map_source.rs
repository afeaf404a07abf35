//! In-memory pair source.

use async_trait::async_trait;
use config_resolver::{ConfigSource, SourceError, SourceId, Tags};

#[cfg(test)]
#[path = "map_source_tests.rs"]
mod tests;

/// A source serving a fixed list of `(path, value)` pairs.
///
/// Useful for defaults compiled into the application and for tests.
#[derive(Debug, Clone)]
pub struct MapSource {
    id: SourceId,
    name: String,
    tags: Tags,
    pairs: Vec<(String, String)>,
}

impl MapSource {
    pub fn new<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            id: SourceId::new(),
            name: name.into(),
            tags: Tags::new(),
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Scopes every pair of this source to `tags`.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

#[async_trait]
impl ConfigSource for MapSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> Tags {
        self.tags.clone()
    }

    fn has_pairs(&self) -> bool {
        true
    }

    async fn load_pairs(&self) -> Result<Vec<(String, String)>, SourceError> {
        Ok(self.pairs.clone())
    }
}
