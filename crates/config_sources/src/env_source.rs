//! Environment variable source.
//!
//! Variables carrying a prefix become configuration pairs. The prefix is
//! stripped, every `_` separates a path segment and an all-digit segment
//! is an array index:
//!
//! ```text
//! APP_DB_PORT=5432        ->  db.port = 5432
//! APP_DB_HOSTS_0=a        ->  db.hosts[0] = a
//! ```
//!
//! Segment names are left as written; the resolver's lexer normalizes case.

use async_trait::async_trait;
use config_resolver::{ConfigSource, SourceError, SourceId, Tags};
use tracing::debug;

#[cfg(test)]
#[path = "env_source_tests.rs"]
mod tests;

/// A source reading prefixed variables from the process environment.
#[derive(Debug, Clone)]
pub struct EnvironmentSource {
    id: SourceId,
    name: String,
    prefix: String,
    tags: Tags,
}

impl EnvironmentSource {
    /// Reads variables starting with `prefix`, such as `APP_`.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            id: SourceId::new(),
            name: format!("env:{}", prefix),
            prefix,
            tags: Tags::new(),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Converts variables into pairs, skipping those without the prefix.
    pub fn from_vars(
        prefix: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = vars
            .into_iter()
            .filter_map(|(name, value)| {
                let rest = name.strip_prefix(prefix)?;
                variable_path(rest).map(|path| (path, value))
            })
            .collect();
        pairs.sort();
        pairs
    }
}

/// Turns `DB_HOSTS_0` into `DB.HOSTS[0]`.
fn variable_path(name: &str) -> Option<String> {
    let mut path = String::new();
    for segment in name.split('_').filter(|s| !s.is_empty()) {
        if !path.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
            path.push('[');
            path.push_str(segment);
            path.push(']');
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(segment);
        }
    }
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

#[async_trait]
impl ConfigSource for EnvironmentSource {
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
        let pairs = Self::from_vars(&self.prefix, std::env::vars());
        debug!(
            "Read {} variable(s) with prefix '{}'",
            pairs.len(),
            self.prefix
        );
        Ok(pairs)
    }
}
