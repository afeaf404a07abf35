//! Configuration system error types.
//!
//! Caller-facing errors for loading, reloading and querying the resolved
//! configuration. Component-level failures (sources, includes, annotations,
//! secret sealing) have their own error enums next to the component and are
//! folded into [`ValidationIssue`]s before they reach this level.

use thiserror::Error;

use crate::validation::ValidationIssue;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Configuration system errors.
///
/// These errors surface from the resolver's public operations. Every variant
/// that is caused by configuration content carries the complete, ordered list
/// of issues collected while the operation ran.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Failed to parse configuration: {reason}")]
    ParseError { reason: String },

    #[error("Configuration source is not registered: {source_id}")]
    UnknownSource { source_id: String },

    #[error("Configuration load failed with {error_count} error(s)")]
    LoadFailed {
        error_count: usize,
        issues: Vec<ValidationIssue>,
    },

    #[error("Failed to decode '{path}' as {type_name} with {error_count} error(s)")]
    DecodeFailed {
        path: String,
        type_name: String,
        error_count: usize,
        issues: Vec<ValidationIssue>,
    },
}

impl ConfigurationError {
    /// Returns the issues carried by this error, if any.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::LoadFailed { issues, .. } | Self::DecodeFailed { issues, .. } => issues,
            _ => &[],
        }
    }
}

/// Result type alias for configuration operations.
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;
