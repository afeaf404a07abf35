//! Resolver options.
//!
//! Options are plain `serde` structures so applications can keep them next to
//! the rest of their bootstrap configuration. Every field has a default, so a
//! partial TOML document only needs to name what it changes.
//!
//! ```toml
//! strict = true
//! failure_threshold = "error"
//!
//! [lexer]
//! delimiter = "."
//!
//! [secrets]
//! encrypted_paths = ["^db\\.password$"]
//! temporary = [{ pattern = "token$", reads = 1 }]
//!
//! [include]
//! max_depth = 3
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigurationError, ConfigurationResult};
use crate::validation::Severity;

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;

/// Default segment pattern: `name` or `name[index]`.
pub const DEFAULT_SEGMENT_PATTERN: &str =
    r"^(?P<name>[^\[\]]+)(?P<array>\[(?P<index>[^\[\]]*)\])?$";

/// Default tag pattern: `@key=value`.
pub const DEFAULT_TAG_PATTERN: &str = r"^@(?P<key>[^=\[\]]+)=(?P<value>[^\[\]]*)$";

/// Default upper bound for array indices in paths.
pub const DEFAULT_MAX_ARRAY_INDEX: usize = 10_000;

/// Options controlling the whole resolution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    /// Treat every warning as an error.
    pub strict: bool,

    /// Abort `load`/`reload` when an error-level issue is found. When `false`
    /// the issues are logged and the best-effort tree is kept.
    pub fail_on_load_errors: bool,

    /// Lowest severity that makes a non-defaulted `get` fail.
    pub failure_threshold: Severity,

    /// Level used to log the issues of a defaulted `get` that fell back.
    pub default_log_level: Severity,

    /// Memoize decoded values.
    pub cache_enabled: bool,

    pub lexer: LexerSettings,
    pub annotations: AnnotationSettings,
    pub secrets: SecretSettings,
    pub include: IncludeSettings,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            strict: false,
            fail_on_load_errors: true,
            failure_threshold: Severity::Error,
            default_log_level: Severity::Debug,
            cache_enabled: true,
            lexer: LexerSettings::default(),
            annotations: AnnotationSettings::default(),
            secrets: SecretSettings::default(),
            include: IncludeSettings::default(),
        }
    }
}

impl ResolverOptions {
    /// Parses options from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::ParseError` if the document is not valid
    /// TOML or does not match the option schema.
    pub fn from_toml_str(content: &str) -> ConfigurationResult<Self> {
        toml::from_str(content).map_err(|e| ConfigurationError::ParseError {
            reason: e.to_string(),
        })
    }
}

/// How path segments are normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseMode {
    /// Lower-case every segment (locale invariant).
    Lower,
    /// Keep segments as written.
    Preserve,
}

/// Path lexer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexerSettings {
    pub delimiter: String,
    /// Regex with a `name` group and optional `array`/`index` groups.
    pub segment_pattern: String,
    /// Regex with `key` and `value` groups.
    pub tag_pattern: String,
    pub case: CaseMode,
    /// Largest array index a path may name.
    pub max_array_index: usize,
}

impl Default for LexerSettings {
    fn default() -> Self {
        Self {
            delimiter: ".".to_string(),
            segment_pattern: DEFAULT_SEGMENT_PATTERN.to_string(),
            tag_pattern: DEFAULT_TAG_PATTERN.to_string(),
            case: CaseMode::Lower,
            max_array_index: DEFAULT_MAX_ARRAY_INDEX,
        }
    }
}

/// Inline annotation syntax, `@{name:param}` by default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSettings {
    pub open: String,
    pub close: String,
    pub parameter_separator: String,
}

impl Default for AnnotationSettings {
    fn default() -> Self {
        Self {
            open: "@{".to_string(),
            close: "}".to_string(),
            parameter_separator: ":".to_string(),
        }
    }
}

/// A path rule granting temporary access to matching leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryRule {
    /// Regex matched against the normalized leaf path.
    pub pattern: String,
    /// Number of reads before the value is discarded.
    pub reads: u32,
}

/// Secret handling settings. All patterns are regexes matched against
/// normalized paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretSettings {
    /// Paths whose values are masked in messages and debug output.
    pub secret_paths: Vec<String>,
    /// Paths whose values are held encrypted in memory.
    pub encrypted_paths: Vec<String>,
    /// Paths whose values may only be read a limited number of times.
    pub temporary: Vec<TemporaryRule>,
}

impl Default for SecretSettings {
    fn default() -> Self {
        Self {
            secret_paths: ["secret", "password", "pass", "apikey", "token", "credential"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            encrypted_paths: Vec::new(),
            temporary: Vec::new(),
        }
    }
}

/// Include directive settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeSettings {
    pub keyword: String,
    pub max_depth: usize,
}

impl Default for IncludeSettings {
    fn default() -> Self {
        Self {
            keyword: "$include".to_string(),
            max_depth: 5,
        }
    }
}
