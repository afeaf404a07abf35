//! Tests for the path lexer.

use super::*;
use crate::settings::LexerSettings;

fn object(name: &str) -> PathToken {
    PathToken::Object(name.to_string())
}

// ============================================================================
// Successful tokenization
// ============================================================================

/// Verify a plain dotted path becomes object tokens.
#[test]
fn test_tokenize_dotted_path() {
    let lexer = PathLexer::new();

    let result = lexer.tokenize("db.host");

    assert!(result.issues.is_empty());
    assert_eq!(result.value.unwrap(), vec![object("db"), object("host")]);
}

/// Verify array syntax yields an object token followed by an array token.
#[test]
fn test_tokenize_array_segment() {
    let lexer = PathLexer::new();

    let tokens = lexer.tokenize("db.hosts[0].user").value.unwrap();

    assert_eq!(
        tokens,
        vec![
            object("db"),
            object("hosts"),
            PathToken::Array(0),
            object("user")
        ]
    );
}

/// Verify tag segments become tag tokens.
#[test]
fn test_tokenize_tag_segment() {
    let lexer = PathLexer::new();

    let tokens = lexer.tokenize("@env=Prod.db.host").value.unwrap();

    assert_eq!(
        tokens[0],
        PathToken::Tag {
            key: "env".to_string(),
            value: "prod".to_string()
        }
    );
    assert_eq!(tokens[1..], [object("db"), object("host")]);
}

/// Verify case folding is applied to every segment.
#[test]
fn test_tokenize_normalizes_case() {
    let lexer = PathLexer::new();

    let upper = lexer.tokenize("DATABASE.PORT").value.unwrap();
    let lower = lexer.tokenize("database.port").value.unwrap();

    assert_eq!(upper, lower);
}

/// Verify case folding does not depend on locale-specific rules.
#[test]
fn test_normalization_is_locale_invariant() {
    let lexer = PathLexer::new();

    // The dotted capital I lowercases to "i" followed by a combining dot in
    // the Unicode default mapping, never to the Turkish dotless form.
    assert_eq!(lexer.normalize("TITLE"), "title");
    assert_eq!(lexer.normalize("İ"), "i\u{307}");
}

/// Verify the preserve-case setting keeps segments as written.
#[test]
fn test_preserve_case_settings() {
    let settings = LexerSettings {
        case: CaseMode::Preserve,
        ..Default::default()
    };
    let lexer = PathLexer::from_settings(&settings).unwrap();

    let tokens = lexer.tokenize("Db.Host").value.unwrap();

    assert_eq!(tokens, vec![object("Db"), object("Host")]);
}

/// Verify a custom delimiter is honoured.
#[test]
fn test_custom_delimiter() {
    let settings = LexerSettings {
        delimiter: "_".to_string(),
        ..Default::default()
    };
    let lexer = PathLexer::from_settings(&settings).unwrap();

    let tokens = lexer.tokenize("DB_HOST").value.unwrap();

    assert_eq!(tokens, vec![object("db"), object("host")]);
}

// ============================================================================
// Failures
// ============================================================================

/// Verify an empty path is rejected.
#[test]
fn test_empty_path() {
    let lexer = PathLexer::new();

    let result = lexer.tokenize("   ");

    assert!(result.value.is_none());
    assert_eq!(result.issues[0].kind, IssueKind::EmptyPath);
}

/// Verify empty segments are reported while the rest is still tokenized.
#[test]
fn test_empty_segment_keeps_partial_tokens() {
    let lexer = PathLexer::new();

    let result = lexer.tokenize("db..host");

    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].kind, IssueKind::EmptySegment);
    assert_eq!(result.value.unwrap(), vec![object("db"), object("host")]);
}

/// Verify negative indices are rejected.
#[test]
fn test_negative_index() {
    let lexer = PathLexer::new();

    let result = lexer.tokenize("hosts[-1]");

    assert!(result.has_errors(false));
    assert_eq!(result.issues[0].kind, IssueKind::InvalidArrayIndex);
    assert!(result.issues[0].message.contains("negative"));
}

/// Verify indices above the configured limit are rejected.
#[test]
fn test_index_above_limit() {
    let lexer = PathLexer::new();

    let result = lexer.tokenize("hosts[9223372036854775807]");

    assert!(result.has_errors(false));
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].kind, IssueKind::InvalidArrayIndex);
    assert!(result.issues[0].message.contains("exceeds the limit"));
}

/// Verify the index limit comes from the settings.
#[test]
fn test_custom_index_limit() {
    let settings = LexerSettings {
        max_array_index: 3,
        ..Default::default()
    };
    let lexer = PathLexer::from_settings(&settings).unwrap();

    assert!(!lexer.tokenize("hosts[3]").has_errors(false));
    let result = lexer.tokenize("hosts[4]");
    assert_eq!(result.issues[0].kind, IssueKind::InvalidArrayIndex);
}

/// Verify non-numeric indices are rejected.
#[test]
fn test_non_numeric_index() {
    let lexer = PathLexer::new();

    let result = lexer.tokenize("hosts[abc]");

    assert_eq!(result.issues[0].kind, IssueKind::InvalidArrayIndex);
    assert!(result.issues[0].message.contains("not a number"));
}

/// Verify segments that fail the pattern are reported as unparsable.
#[test]
fn test_unparsable_segment() {
    let lexer = PathLexer::new();

    let result = lexer.tokenize("db.hosts[0][1]");

    assert_eq!(result.issues[0].kind, IssueKind::UnparsableSegment);
}

/// Verify a pattern without a name group is reported.
#[test]
fn test_missing_name_capture_group() {
    let settings = LexerSettings {
        segment_pattern: r"^(?P<other>\w+)$".to_string(),
        ..Default::default()
    };
    let lexer = PathLexer::from_settings(&settings).unwrap();

    let result = lexer.tokenize("db");

    assert_eq!(result.issues[0].kind, IssueKind::MissingCaptureGroup);
}

/// Verify invalid settings are rejected at construction.
#[test]
fn test_invalid_settings() {
    let bad_pattern = LexerSettings {
        segment_pattern: "([".to_string(),
        ..Default::default()
    };
    let empty_delimiter = LexerSettings {
        delimiter: String::new(),
        ..Default::default()
    };

    assert!(matches!(
        PathLexer::from_settings(&bad_pattern),
        Err(ConfigurationError::InvalidConfiguration { .. })
    ));
    assert!(matches!(
        PathLexer::from_settings(&empty_delimiter),
        Err(ConfigurationError::InvalidConfiguration { .. })
    ));
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_render_path() {
    let tokens = vec![
        object("db"),
        object("hosts"),
        PathToken::Array(2),
        object("user"),
    ];

    assert_eq!(render_path(&tokens), "db.hosts[2].user");
    assert_eq!(join_key("", "db"), "db");
    assert_eq!(join_index("hosts", 0), "hosts[0]");
}
