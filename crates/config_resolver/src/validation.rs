//! Leveled validation issues and the value-plus-issues result type.
//!
//! Every stage of the engine (lexing, compiling, merging, processing and
//! decoding) reports problems as [`ValidationIssue`]s instead of failing on the
//! first one. Stages return a [`Validated<T>`] which pairs an optional value with
//! every issue found, so a caller sees the complete diagnostic picture from a
//! single call.
//!
//! # Examples
//!
//! ```rust
//! use config_resolver::{IssueKind, Severity, Validated, ValidationIssue};
//!
//! let mut result = Validated::ok(42);
//! result.push(ValidationIssue::warn(
//!     IssueKind::DuplicateKey,
//!     "db.port",
//!     "Key appears twice after normalization",
//! ));
//!
//! assert!(!result.has_errors(false));
//! assert!(result.has_errors(true)); // strict mode promotes warnings
//! assert_eq!(result.max_severity(), Some(Severity::Warn));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;

/// Severity of a validation issue. Ordered `Debug < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Warn,
    Error,
}

impl Severity {
    /// Returns the severity after applying strict-mode promotion.
    ///
    /// In strict mode every warning is treated as an error.
    pub fn effective(self, strict: bool) -> Self {
        match self {
            Severity::Warn if strict => Severity::Error,
            other => other,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Validation issue categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// The path to tokenize was empty.
    EmptyPath,
    /// A path segment between two delimiters was empty.
    EmptySegment,
    /// A path segment did not match the configured segment pattern.
    UnparsableSegment,
    /// An array index was negative or not a number.
    InvalidArrayIndex,
    /// The configured pattern matched but a required capture group was absent.
    MissingCaptureGroup,
    /// Tokens of more than one kind were found at the same depth.
    MixedTokenKinds,
    /// A token kind that cannot form a tree node reached the compiler.
    UnsupportedToken,
    /// An array index between zero and the largest index was never defined.
    MissingArrayIndex,
    /// Two fragments defined the same leaf path.
    DuplicateLeaf,
    /// A path is defined both as a leaf and as a container.
    LeafNonLeafConflict,
    /// A merge replaced a node with a node of another kind.
    KindOverride,
    /// Two keys collapsed into one after normalization.
    DuplicateKey,
    /// An annotation referenced a transform that is not registered.
    UnknownAnnotation,
    /// An annotation was opened but never closed.
    UnterminatedAnnotation,
    /// An annotation transform rejected its parameter.
    AnnotationFailure,
    /// A secret value could not be sealed.
    EncryptionFailure,
    /// An include directive was malformed.
    InvalidInclude,
    /// Includes were nested deeper than the configured limit.
    MaxNestedIncludes,
    /// Include parameters did not name a source.
    NoSourceKey,
    /// Include parameters named a source with no registered factory.
    NoFactoryForSource,
    /// A source factory failed to build its sources.
    SourceBuildFailure,
    /// A configuration source failed to load.
    SourceLoadFailure,
    /// A configuration source offers neither a byte stream nor a pair list.
    UnsupportedSource,
    /// No node exists at the requested path.
    NoNodeFound,
    /// A leaf exists but carries no value.
    MissingValue,
    /// A required field of an aggregate is missing.
    MissingRequiredField,
    /// The node kind does not fit the requested type.
    TypeMismatch,
    /// The leaf value could not be converted to the requested type.
    InvalidValue,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Individual validation issue with its location and severity.
///
/// # Examples
///
/// ```rust
/// use config_resolver::{IssueKind, Severity, ValidationIssue};
///
/// let issue = ValidationIssue::error(
///     IssueKind::MissingArrayIndex,
///     "db.hosts[1]",
///     "Array is missing index 1",
/// );
/// assert_eq!(issue.severity, Severity::Error);
/// assert_eq!(issue.to_string(), "ERROR MissingArrayIndex at 'db.hosts[1]': Array is missing index 1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidationIssue {
    /// How serious the issue is.
    pub severity: Severity,
    /// The category of the issue.
    pub kind: IssueKind,
    /// Normalized path of the node the issue refers to.
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Creates an issue with an explicit severity.
    pub fn new(
        severity: Severity,
        kind: IssueKind,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an `ERROR` issue.
    pub fn error(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, path, message)
    }

    /// Creates a `WARN` issue.
    pub fn warn(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, kind, path, message)
    }

    /// Creates a `DEBUG` issue.
    pub fn debug(kind: IssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Debug, kind, path, message)
    }

    /// Returns `true` when this issue counts as an error under the given mode.
    pub fn is_error(&self, strict: bool) -> bool {
        self.severity.effective(strict) == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at '{}': {}",
            self.severity, self.kind, self.path, self.message
        )
    }
}

/// A value paired with every issue found while producing it.
///
/// `value` is `None` when an error prevented producing anything at all. A
/// present value may still come with issues, including errors in nested
/// subtrees that were dropped while their siblings completed.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    pub value: Option<T>,
    pub issues: Vec<ValidationIssue>,
}

impl<T> Validated<T> {
    /// A value with no issues.
    pub fn ok(value: T) -> Self {
        Self {
            value: Some(value),
            issues: Vec::new(),
        }
    }

    /// A value together with issues.
    pub fn with_issues(value: T, issues: Vec<ValidationIssue>) -> Self {
        Self {
            value: Some(value),
            issues,
        }
    }

    /// No value, a single issue.
    pub fn failed(issue: ValidationIssue) -> Self {
        Self {
            value: None,
            issues: vec![issue],
        }
    }

    /// No value, several issues.
    pub fn failed_with(issues: Vec<ValidationIssue>) -> Self {
        Self {
            value: None,
            issues,
        }
    }

    /// Adds an issue.
    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Returns `true` if any issue counts as an error under the given mode.
    pub fn has_errors(&self, strict: bool) -> bool {
        self.issues.iter().any(|issue| issue.is_error(strict))
    }

    /// The highest severity among the issues.
    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|issue| issue.severity).max()
    }

    /// Moves this result's issues into `sink` and returns the value.
    pub fn absorb_into(self, sink: &mut Vec<ValidationIssue>) -> Option<T> {
        sink.extend(self.issues);
        self.value
    }

    /// Transforms the value, keeping the issues.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Validated<U> {
        Validated {
            value: self.value.map(f),
            issues: self.issues,
        }
    }

    /// Splits into the value and the issues.
    pub fn into_parts(self) -> (Option<T>, Vec<ValidationIssue>) {
        (self.value, self.issues)
    }
}
