//! Tests for the environment source.

use super::*;
use serial_test::serial;

fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ============================================================================
// Variable names
// ============================================================================

/// Verify separators and array indices are translated.
#[test]
fn test_from_vars_translates_names() {
    let pairs = EnvironmentSource::from_vars(
        "APP_",
        vars(&[
            ("APP_DB_PORT", "5432"),
            ("APP_DB_HOSTS_0", "a"),
            ("APP_DB_HOSTS_1", "b"),
            ("OTHER_DB_PORT", "1"),
        ]),
    );

    assert_eq!(
        pairs,
        vars(&[
            ("DB.HOSTS[0]", "a"),
            ("DB.HOSTS[1]", "b"),
            ("DB.PORT", "5432"),
        ])
    );
}

/// Verify empty segments are ignored and a bare prefix yields nothing.
#[test]
fn test_from_vars_edge_cases() {
    let pairs = EnvironmentSource::from_vars(
        "APP_",
        vars(&[("APP_", "x"), ("APP_DB__PORT", "1"), ("APP_0", "y")]),
    );

    assert_eq!(pairs, vars(&[("0", "y"), ("DB.PORT", "1")]));
}

// ============================================================================
// Process environment
// ============================================================================

/// Verify the source reads the live environment.
#[tokio::test]
#[serial]
async fn test_load_pairs_from_environment() {
    std::env::set_var("CFGTEST_SERVICE_NAME", "billing");
    std::env::set_var("CFGTEST_SERVICE_PORTS_0", "80");

    let source = EnvironmentSource::new("CFGTEST_");
    let pairs = source.load_pairs().await.unwrap();

    std::env::remove_var("CFGTEST_SERVICE_NAME");
    std::env::remove_var("CFGTEST_SERVICE_PORTS_0");

    assert_eq!(
        pairs,
        vars(&[("SERVICE.NAME", "billing"), ("SERVICE.PORTS[0]", "80")])
    );
    assert_eq!(source.name(), "env:CFGTEST_");
}
