//! Tests for validation issues and results.

use super::*;

#[test]
fn test_severity_ordering() {
    assert!(Severity::Debug < Severity::Warn);
    assert!(Severity::Warn < Severity::Error);
}

#[test]
fn test_strict_mode_promotes_only_warnings() {
    assert_eq!(Severity::Warn.effective(true), Severity::Error);
    assert_eq!(Severity::Warn.effective(false), Severity::Warn);
    assert_eq!(Severity::Debug.effective(true), Severity::Debug);
    assert_eq!(Severity::Error.effective(false), Severity::Error);
}

#[test]
fn test_issue_display() {
    let issue = ValidationIssue::warn(IssueKind::InvalidValue, "a.b", "bad char");
    assert_eq!(issue.to_string(), "WARN InvalidValue at 'a.b': bad char");
}

#[test]
fn test_validated_collects_issues() {
    let mut result = Validated::ok("value");
    assert!(!result.has_errors(false));
    assert_eq!(result.max_severity(), None);

    result.push(ValidationIssue::debug(IssueKind::KindOverride, "a", "replaced"));
    result.push(ValidationIssue::error(IssueKind::NoNodeFound, "b", "missing"));

    assert!(result.has_errors(false));
    assert_eq!(result.max_severity(), Some(Severity::Error));
}

#[test]
fn test_absorb_into_moves_issues() {
    let mut sink = Vec::new();
    let result = Validated::with_issues(
        5,
        vec![ValidationIssue::warn(IssueKind::DuplicateKey, "x", "dup")],
    );

    let value = result.absorb_into(&mut sink);

    assert_eq!(value, Some(5));
    assert_eq!(sink.len(), 1);
}

#[test]
fn test_failed_has_no_value() {
    let result: Validated<i32> =
        Validated::failed(ValidationIssue::error(IssueKind::EmptyPath, "", "empty"));

    let (value, issues) = result.into_parts();
    assert!(value.is_none());
    assert_eq!(issues.len(), 1);
}

#[test]
fn test_severity_deserializes_lowercase() {
    #[derive(serde::Deserialize)]
    struct Holder {
        level: Severity,
    }

    let holder: Holder = toml::from_str("level = \"warn\"").unwrap();
    assert_eq!(holder.level, Severity::Warn);
}
