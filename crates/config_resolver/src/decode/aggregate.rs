//! Field-by-field decoding of application structs.

use super::{Decode, DecodeContext};
use crate::node::{ConfigNode, MapNode};
use crate::validation::{IssueKind, Validated, ValidationIssue};

/// Decodes the fields of an aggregate from a map node.
///
/// Field accessors never fail outright; they record issues and return
/// `None` so every field is checked in one pass. [`finish`](Self::finish)
/// then decides whether the aggregate could be built.
pub struct AggregateDecoder<'n, 'a> {
    map: Option<&'n MapNode>,
    ctx: &'n DecodeContext<'a>,
    issues: Vec<ValidationIssue>,
    failed: bool,
}

impl<'n, 'a> AggregateDecoder<'n, 'a> {
    pub(crate) fn new(node: &'n ConfigNode, ctx: &'n DecodeContext<'a>, type_name: &str) -> Self {
        match node {
            ConfigNode::Map(map) => Self {
                map: Some(map),
                ctx,
                issues: Vec::new(),
                failed: false,
            },
            other => Self {
                map: None,
                ctx,
                issues: vec![ctx.type_mismatch(other, type_name)],
                failed: true,
            },
        }
    }

    fn field<T: Decode>(&mut self, field: &str, required: bool) -> Option<T> {
        let map = self.map?;
        let key = self.ctx.lexer().normalize(field);
        let child_ctx = self.ctx.child(&key);

        let Some(node) = map.get(&key) else {
            if required {
                self.issues.push(ValidationIssue::error(
                    IssueKind::MissingRequiredField,
                    child_ctx.path(),
                    format!("Missing required field '{}'", child_ctx.path()),
                ));
                self.failed = true;
            }
            return None;
        };

        let value = child_ctx.decode::<T>(Some(node)).absorb_into(&mut self.issues);
        if value.is_none() {
            self.failed = true;
        }
        value
    }

    /// A field that must be present and valid.
    pub fn required<T: Decode>(&mut self, field: &str) -> Option<T> {
        self.field(field, true)
    }

    /// A field that may be absent. A present but invalid value still fails
    /// the aggregate.
    pub fn optional<T: Decode>(&mut self, field: &str) -> Option<T> {
        self.field(field, false)
    }

    /// An optional field falling back to `T::default()`.
    pub fn or_default<T: Decode + Default>(&mut self, field: &str) -> T {
        self.optional(field).unwrap_or_default()
    }

    /// An optional field falling back to `default`.
    pub fn or_else<T: Decode>(&mut self, field: &str, default: T) -> T {
        self.optional(field).unwrap_or(default)
    }

    /// Adds an issue of the caller's own, such as a cross-field check.
    pub fn push_issue(&mut self, issue: ValidationIssue) {
        if issue.severity == crate::validation::Severity::Error {
            self.failed = true;
        }
        self.issues.push(issue);
    }

    /// Builds the aggregate unless a field failed.
    pub fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> Validated<T> {
        if self.failed {
            return Validated::failed_with(self.issues);
        }
        match build() {
            Some(value) => Validated::with_issues(value, self.issues),
            None => Validated::failed_with(self.issues),
        }
    }
}
