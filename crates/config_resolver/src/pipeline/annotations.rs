//! Inline value annotations.
//!
//! A leaf value may carry markers such as `@{secret}` or `@{temp:3}`. Each
//! marker names an [`AnnotationTransform`] which turns its optional parameter
//! into leaf metadata. Recognized markers are removed from the value, which is
//! then trimmed:
//!
//! ```text
//! db.password = "hunter2 @{secret} @{temp:1}"
//! ```
//!
//! becomes the value `hunter2` with `secret`, `temporary = 1` and `no_cache`
//! metadata.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::{NodeProcessor, Processed};
use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::node::{meta_keys, ConfigNode, LeafNode, MetaValue, Metadata};
use crate::settings::AnnotationSettings;
use crate::validation::{IssueKind, ValidationIssue};

#[cfg(test)]
#[path = "annotations_tests.rs"]
mod tests;

/// Errors raised by annotation transforms.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("Annotation '{annotation}' requires a parameter")]
    MissingParameter { annotation: String },

    #[error("Invalid parameter '{parameter}' for annotation '{annotation}': {reason}")]
    InvalidParameter {
        annotation: String,
        parameter: String,
        reason: String,
    },
}

/// Turns an annotation parameter into leaf metadata.
pub trait AnnotationTransform: Send + Sync {
    /// The name used inside markers. Matched case-insensitively.
    fn name(&self) -> &str;

    fn transform(&self, parameter: Option<&str>) -> Result<Metadata, AnnotationError>;
}

/// An annotation that sets fixed flags and takes no parameter.
#[derive(Debug, Clone)]
pub struct FlagAnnotation {
    name: String,
    flags: Vec<&'static str>,
}

impl FlagAnnotation {
    pub fn new(name: impl Into<String>, flags: &[&'static str]) -> Self {
        Self {
            name: name.into(),
            flags: flags.to_vec(),
        }
    }

    /// `@{secret}`: mask the value in messages.
    pub fn secret() -> Self {
        Self::new("secret", &[meta_keys::SECRET])
    }

    /// `@{nocache}`: never memoize values decoded from this leaf.
    pub fn no_cache() -> Self {
        Self::new("nocache", &[meta_keys::NO_CACHE])
    }

    /// `@{encrypt}`: hold the value encrypted in memory.
    pub fn encrypt() -> Self {
        Self::new("encrypt", &[meta_keys::ENCRYPTED, meta_keys::NO_CACHE])
    }
}

impl AnnotationTransform for FlagAnnotation {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, _parameter: Option<&str>) -> Result<Metadata, AnnotationError> {
        Ok(self
            .flags
            .iter()
            .map(|flag| (flag.to_string(), vec![MetaValue::Flag(true)]))
            .collect())
    }
}

/// `@{temp:<reads>}`: the value may be read `reads` times.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporaryAnnotation;

impl AnnotationTransform for TemporaryAnnotation {
    fn name(&self) -> &str {
        "temp"
    }

    fn transform(&self, parameter: Option<&str>) -> Result<Metadata, AnnotationError> {
        let parameter = parameter.map(str::trim).filter(|p| !p.is_empty()).ok_or_else(|| {
            AnnotationError::MissingParameter {
                annotation: self.name().to_string(),
            }
        })?;

        let reads = parameter
            .parse::<u32>()
            .map_err(|e| AnnotationError::InvalidParameter {
                annotation: self.name().to_string(),
                parameter: parameter.to_string(),
                reason: e.to_string(),
            })?;
        if reads == 0 {
            return Err(AnnotationError::InvalidParameter {
                annotation: self.name().to_string(),
                parameter: parameter.to_string(),
                reason: "read count must be at least 1".to_string(),
            });
        }

        let mut metadata = Metadata::new();
        metadata.insert(meta_keys::TEMPORARY.to_string(), vec![MetaValue::Count(reads)]);
        metadata.insert(meta_keys::NO_CACHE.to_string(), vec![MetaValue::Flag(true)]);
        Ok(metadata)
    }
}

/// Applies registered annotation transforms to plain leaf values.
#[derive(Clone)]
pub struct AnnotationProcessor {
    open: String,
    close: String,
    separator: String,
    transforms: HashMap<String, Arc<dyn AnnotationTransform>>,
}

impl AnnotationProcessor {
    /// Creates a processor with the built-in transforms registered.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidConfiguration` if a delimiter is
    /// empty.
    pub fn from_settings(settings: &AnnotationSettings) -> ConfigurationResult<Self> {
        for (field, value) in [
            ("annotations.open", &settings.open),
            ("annotations.close", &settings.close),
            ("annotations.parameter_separator", &settings.parameter_separator),
        ] {
            if value.is_empty() {
                return Err(ConfigurationError::InvalidConfiguration {
                    field: field.to_string(),
                    reason: "Delimiter must not be empty".to_string(),
                });
            }
        }

        let mut processor = Self {
            open: settings.open.clone(),
            close: settings.close.clone(),
            separator: settings.parameter_separator.clone(),
            transforms: HashMap::new(),
        };
        processor.register(Arc::new(FlagAnnotation::secret()));
        processor.register(Arc::new(FlagAnnotation::no_cache()));
        processor.register(Arc::new(FlagAnnotation::encrypt()));
        processor.register(Arc::new(TemporaryAnnotation));
        Ok(processor)
    }

    /// Registers a transform, replacing any transform with the same name.
    pub fn register(&mut self, transform: Arc<dyn AnnotationTransform>) {
        self.transforms
            .insert(transform.name().to_lowercase(), transform);
    }

    fn annotate(&self, path: &str, leaf: LeafNode) -> Processed {
        let Some(value) = leaf.plain_value() else {
            return Processed::unchanged(ConfigNode::Leaf(leaf));
        };
        if !value.contains(self.open.as_str()) {
            return Processed::unchanged(ConfigNode::Leaf(leaf));
        }

        let mut issues = Vec::new();
        let mut metadata = Metadata::new();
        let mut kept = String::with_capacity(value.len());
        let mut stripped_any = false;
        let mut rest = value;

        while let Some(start) = rest.find(self.open.as_str()) {
            kept.push_str(&rest[..start]);
            let after_open = &rest[start + self.open.len()..];
            let Some(end) = after_open.find(self.close.as_str()) else {
                issues.push(ValidationIssue::error(
                    IssueKind::UnterminatedAnnotation,
                    path,
                    format!("Annotation opened with '{}' is never closed", self.open),
                ));
                kept.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let marker = &rest[start..start + self.open.len() + end + self.close.len()];
            let body = &after_open[..end];
            let (name, parameter) = match body.split_once(self.separator.as_str()) {
                Some((name, parameter)) => (name.trim(), Some(parameter)),
                None => (body.trim(), None),
            };

            match self.transforms.get(&name.to_lowercase()) {
                Some(transform) => match transform.transform(parameter) {
                    Ok(produced) => {
                        for (key, values) in produced {
                            metadata.entry(key).or_insert_with(Vec::new).extend(values);
                        }
                        stripped_any = true;
                    }
                    Err(e) => {
                        issues.push(ValidationIssue::error(
                            IssueKind::AnnotationFailure,
                            path,
                            e.to_string(),
                        ));
                        kept.push_str(marker);
                    }
                },
                None => {
                    issues.push(ValidationIssue::error(
                        IssueKind::UnknownAnnotation,
                        path,
                        format!("Unknown annotation '{}'", name),
                    ));
                    kept.push_str(marker);
                }
            }

            rest = &after_open[end + self.close.len()..];
        }
        kept.push_str(rest);

        if !stripped_any {
            return Processed::with_issues(ConfigNode::Leaf(leaf), issues);
        }

        let (_, mut existing) = leaf.into_parts();
        for (key, values) in metadata {
            existing.entry(key).or_default().extend(values);
        }
        let rewritten = LeafNode::from_payload(
            crate::node::LeafPayload::Plain(Some(kept.trim().to_string())),
            existing,
        );
        Processed::with_issues(ConfigNode::Leaf(rewritten), issues)
    }
}

impl NodeProcessor for AnnotationProcessor {
    fn name(&self) -> &str {
        "annotations"
    }

    fn process(&self, path: &str, node: ConfigNode) -> Processed {
        match node {
            ConfigNode::Leaf(leaf) => self.annotate(path, leaf),
            other => Processed::unchanged(other),
        }
    }
}

impl std::fmt::Debug for AnnotationProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.transforms.keys().collect();
        names.sort();
        f.debug_struct("AnnotationProcessor")
            .field("open", &self.open)
            .field("close", &self.close)
            .field("transforms", &names)
            .finish()
    }
}
