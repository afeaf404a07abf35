//! Path lexer.
//!
//! Splits a configuration path such as `db.hosts[0].user` into typed
//! [`PathToken`]s. The delimiter, the segment pattern and the tag pattern are
//! configurable through [`LexerSettings`]; segment names pass through a
//! [`SentenceNormalizer`] so that the same input always produces the same
//! tokens, independent of the machine's locale.
//!
//! Issue paths and secret-path patterns throughout the crate use the canonical
//! rendering produced by [`render_path`]: `.` between keys and `[n]` for
//! indices, whatever delimiter the lexer itself was configured with.

use regex::Regex;
use std::fmt;
use std::sync::Arc;

use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::settings::{CaseMode, LexerSettings};
use crate::validation::{IssueKind, Validated, ValidationIssue};

#[cfg(test)]
#[path = "lexer_tests.rs"]
mod tests;

/// One step of descent into the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathToken {
    /// A named map key.
    Object(String),
    /// A position in an array.
    Array(usize),
    /// An environment tag; scopes the path rather than descending.
    Tag { key: String, value: String },
}

/// The kind of a [`PathToken`], ignoring its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    Object,
    Array,
    Tag,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => write!(f, "object"),
            Self::Array => write!(f, "array"),
            Self::Tag => write!(f, "tag"),
        }
    }
}

impl PathToken {
    pub fn kind(&self) -> TokenKind {
        match self {
            Self::Object(_) => TokenKind::Object,
            Self::Array(_) => TokenKind::Array,
            Self::Tag { .. } => TokenKind::Tag,
        }
    }
}

/// Normalizes path segments and map keys.
pub trait SentenceNormalizer: Send + Sync + fmt::Debug {
    fn normalize(&self, sentence: &str) -> String;
}

/// Lower-cases using Unicode default case mapping, which does not depend on
/// the process locale.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowerCaseNormalizer;

impl SentenceNormalizer for LowerCaseNormalizer {
    fn normalize(&self, sentence: &str) -> String {
        sentence.trim().to_lowercase()
    }
}

/// Keeps segments as written, apart from surrounding whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreserveCaseNormalizer;

impl SentenceNormalizer for PreserveCaseNormalizer {
    fn normalize(&self, sentence: &str) -> String {
        sentence.trim().to_string()
    }
}

/// Tokenizes configuration paths.
///
/// # Examples
///
/// ```rust
/// use config_resolver::{PathLexer, PathToken};
///
/// let lexer = PathLexer::new();
/// let tokens = lexer.tokenize("DB.Hosts[1].user").value.unwrap();
///
/// assert_eq!(
///     tokens,
///     vec![
///         PathToken::Object("db".to_string()),
///         PathToken::Object("hosts".to_string()),
///         PathToken::Array(1),
///         PathToken::Object("user".to_string()),
///     ]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct PathLexer {
    delimiter: String,
    segment_pattern: Regex,
    tag_pattern: Regex,
    max_array_index: usize,
    normalizer: Arc<dyn SentenceNormalizer>,
}

impl Default for PathLexer {
    fn default() -> Self {
        Self::new()
    }
}

impl PathLexer {
    /// Creates a lexer with the default settings.
    pub fn new() -> Self {
        let settings = LexerSettings::default();
        Self {
            delimiter: settings.delimiter,
            segment_pattern: Regex::new(&settings.segment_pattern)
                .expect("default segment pattern is valid"),
            tag_pattern: Regex::new(&settings.tag_pattern).expect("default tag pattern is valid"),
            max_array_index: settings.max_array_index,
            normalizer: Arc::new(LowerCaseNormalizer),
        }
    }

    /// Creates a lexer from settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidConfiguration` if the delimiter is
    /// empty or a pattern is not a valid regex.
    pub fn from_settings(settings: &LexerSettings) -> ConfigurationResult<Self> {
        if settings.delimiter.is_empty() {
            return Err(ConfigurationError::InvalidConfiguration {
                field: "lexer.delimiter".to_string(),
                reason: "Delimiter must not be empty".to_string(),
            });
        }

        let compile = |field: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| ConfigurationError::InvalidConfiguration {
                field: field.to_string(),
                reason: e.to_string(),
            })
        };

        let normalizer: Arc<dyn SentenceNormalizer> = match settings.case {
            CaseMode::Lower => Arc::new(LowerCaseNormalizer),
            CaseMode::Preserve => Arc::new(PreserveCaseNormalizer),
        };

        Ok(Self {
            delimiter: settings.delimiter.clone(),
            segment_pattern: compile("lexer.segment_pattern", &settings.segment_pattern)?,
            tag_pattern: compile("lexer.tag_pattern", &settings.tag_pattern)?,
            max_array_index: settings.max_array_index,
            normalizer,
        })
    }

    /// Replaces the normalizer.
    pub fn with_normalizer(mut self, normalizer: Arc<dyn SentenceNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn normalizer(&self) -> &dyn SentenceNormalizer {
        self.normalizer.as_ref()
    }

    /// Normalizes a single key the same way segments are normalized.
    pub fn normalize(&self, key: &str) -> String {
        self.normalizer.normalize(key)
    }

    /// Splits `path` into tokens.
    ///
    /// Problems are reported as issues next to the tokens that could be
    /// produced, so a caller may still attempt a best-effort lookup when it
    /// only treats errors as fatal.
    pub fn tokenize(&self, path: &str) -> Validated<Vec<PathToken>> {
        if path.trim().is_empty() {
            return Validated::failed(ValidationIssue::error(
                IssueKind::EmptyPath,
                path,
                "Path is empty",
            ));
        }

        let mut tokens = Vec::new();
        let mut issues = Vec::new();

        for segment in path.split(self.delimiter.as_str()) {
            if segment.trim().is_empty() {
                issues.push(ValidationIssue::error(
                    IssueKind::EmptySegment,
                    path,
                    format!("Path '{}' contains an empty segment", path),
                ));
                continue;
            }
            self.tokenize_segment(path, segment.trim(), &mut tokens, &mut issues);
        }

        Validated::with_issues(tokens, issues)
    }

    fn tokenize_segment(
        &self,
        path: &str,
        segment: &str,
        tokens: &mut Vec<PathToken>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if let Some(captures) = self.tag_pattern.captures(segment) {
            match (captures.name("key"), captures.name("value")) {
                (Some(key), Some(value)) => tokens.push(PathToken::Tag {
                    key: self.normalize(key.as_str()),
                    value: self.normalize(value.as_str()),
                }),
                _ => issues.push(ValidationIssue::error(
                    IssueKind::MissingCaptureGroup,
                    path,
                    format!("Tag segment '{}' is missing its key or value group", segment),
                )),
            }
            return;
        }

        let Some(captures) = self.segment_pattern.captures(segment) else {
            issues.push(ValidationIssue::error(
                IssueKind::UnparsableSegment,
                path,
                format!("Unable to parse segment '{}' of path '{}'", segment, path),
            ));
            return;
        };

        let Some(name) = captures.name("name") else {
            issues.push(ValidationIssue::error(
                IssueKind::MissingCaptureGroup,
                path,
                format!("Segment '{}' did not capture a name", segment),
            ));
            return;
        };
        tokens.push(PathToken::Object(self.normalize(name.as_str())));

        if captures.name("array").is_none() {
            return;
        }
        let Some(index) = captures.name("index") else {
            issues.push(ValidationIssue::error(
                IssueKind::MissingCaptureGroup,
                path,
                format!("Segment '{}' did not capture an array index", segment),
            ));
            return;
        };

        match index.as_str().trim().parse::<i64>() {
            Ok(value) if value < 0 => issues.push(ValidationIssue::error(
                IssueKind::InvalidArrayIndex,
                path,
                format!("Array index {} in segment '{}' is negative", value, segment),
            )),
            Ok(value) if value as u64 > self.max_array_index as u64 => {
                issues.push(ValidationIssue::error(
                    IssueKind::InvalidArrayIndex,
                    path,
                    format!(
                        "Array index {} in segment '{}' exceeds the limit of {}",
                        value, segment, self.max_array_index
                    ),
                ))
            }
            Ok(value) => tokens.push(PathToken::Array(value as usize)),
            Err(_) => issues.push(ValidationIssue::error(
                IssueKind::InvalidArrayIndex,
                path,
                format!(
                    "Array index '{}' in segment '{}' is not a number",
                    index.as_str(),
                    segment
                ),
            )),
        }
    }
}

/// Renders tokens into the canonical path form `a.b[0].c`.
pub fn render_path(tokens: &[PathToken]) -> String {
    let mut rendered = String::new();
    for token in tokens {
        match token {
            PathToken::Object(name) => rendered = join_key(&rendered, name),
            PathToken::Array(index) => rendered = join_index(&rendered, *index),
            PathToken::Tag { key, value } => {
                rendered = join_key(&rendered, &format!("@{}={}", key, value))
            }
        }
    }
    rendered
}

/// Appends a map key to a canonical path.
pub fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Appends an array index to a canonical path.
pub fn join_index(prefix: &str, index: usize) -> String {
    format!("{}[{}]", prefix, index)
}
