//! Include source factories.
//!
//! Each factory answers to one value of the `source` include parameter:
//!
//! ```text
//! svc.$include   = source=map,timeout=30,retries=2
//! db.$include:1  = source=env,prefix=APP_DB_
//! $include:2     = source=file,path=/etc/app/overrides.toml
//! ```
//!
//! Include factories run synchronously inside the processing pipeline, so
//! the file factory reads with blocking I/O.

use config_resolver::pipeline::include::SOURCE_KEY;
use config_resolver::{IncludeError, LoaderRegistry, SourceFactory, SourcePayload};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::env_source::EnvironmentSource;
use crate::file_source::format_from_extension;

#[cfg(test)]
#[path = "factories_tests.rs"]
mod tests;

fn required<'p>(
    source_name: &str,
    parameters: &'p BTreeMap<String, String>,
    key: &str,
) -> Result<&'p str, IncludeError> {
    parameters
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| IncludeError::BuildFailure {
            source_name: source_name.to_string(),
            reason: format!("Missing required parameter '{}'", key),
        })
}

/// `source=map`: every other parameter becomes a pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapSourceFactory {}

impl MapSourceFactory {
    pub fn new() -> Self {
        Self {}
    }
}

impl SourceFactory for MapSourceFactory {
    fn source_name(&self) -> &str {
        "map"
    }

    fn build(&self, parameters: &BTreeMap<String, String>) -> Result<Vec<SourcePayload>, IncludeError> {
        let pairs = parameters
            .iter()
            .filter(|(key, _)| key.as_str() != SOURCE_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(vec![SourcePayload::Pairs(pairs)])
    }
}

/// `source=env,prefix=...`: prefixed environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSourceFactory {}

impl EnvSourceFactory {
    pub fn new() -> Self {
        Self {}
    }
}

impl SourceFactory for EnvSourceFactory {
    fn source_name(&self) -> &str {
        "env"
    }

    fn build(&self, parameters: &BTreeMap<String, String>) -> Result<Vec<SourcePayload>, IncludeError> {
        let prefix = required(self.source_name(), parameters, "prefix")?;
        let pairs = EnvironmentSource::from_vars(prefix, std::env::vars());
        debug!("Included {} variable(s) with prefix '{}'", pairs.len(), prefix);
        Ok(vec![SourcePayload::Pairs(pairs)])
    }
}

/// `source=file,path=...[,format=...]`: a file parsed by the registered
/// loaders.
#[derive(Debug, Clone)]
pub struct FileSourceFactory {
    loaders: Arc<LoaderRegistry>,
}

impl FileSourceFactory {
    pub fn new(loaders: Arc<LoaderRegistry>) -> Self {
        Self { loaders }
    }
}

impl SourceFactory for FileSourceFactory {
    fn source_name(&self) -> &str {
        "file"
    }

    fn build(&self, parameters: &BTreeMap<String, String>) -> Result<Vec<SourcePayload>, IncludeError> {
        let failure = |reason: String| IncludeError::BuildFailure {
            source_name: self.source_name().to_string(),
            reason,
        };

        let path = Path::new(required(self.source_name(), parameters, "path")?);
        let format = match parameters.get("format") {
            Some(format) => format.to_lowercase(),
            None => format_from_extension(path).ok_or_else(|| {
                failure(format!("Cannot tell the format of '{}'", path.display()))
            })?,
        };

        let content = std::fs::read(path)
            .map_err(|e| failure(format!("Failed to read '{}': {}", path.display(), e)))?;
        let payload = self
            .loaders
            .load(&format, &content)
            .map_err(|e| failure(e.to_string()))?;
        debug!("Included '{}' as {}", path.display(), format);
        Ok(vec![payload])
    }
}
