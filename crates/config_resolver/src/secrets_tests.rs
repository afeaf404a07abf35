//! Tests for decorated secret payloads.

use super::*;

// ============================================================================
// EncryptedValue
// ============================================================================

/// Verify a sealed value is not stored in clear and reveals the original.
#[test]
fn test_encrypted_value_reveals_plaintext() {
    let sealed = EncryptedValue::seal("s3cr3t-password").unwrap();

    assert_ne!(sealed.ciphertext.as_slice(), "s3cr3t-password".as_bytes());
    assert_eq!(sealed.reveal().as_deref(), Some("s3cr3t-password"));
    // Decryption happens on every read, the payload stays usable.
    assert_eq!(sealed.reveal().as_deref(), Some("s3cr3t-password"));
}

/// Verify each value gets its own key and nonce.
#[test]
fn test_each_seal_uses_fresh_key_material() {
    let first = EncryptedValue::seal("same").unwrap();
    let second = EncryptedValue::seal("same").unwrap();

    assert_ne!(first.nonce, second.nonce);
    assert_ne!(first.key.expose_secret(), second.key.expose_secret());
    assert_ne!(first.ciphertext, second.ciphertext);
}

/// Verify tampered ciphertext yields an empty value instead of panicking.
#[test]
fn test_decrypt_failure_yields_none() {
    let mut sealed = EncryptedValue::seal("value").unwrap();
    sealed.ciphertext[0] ^= 0xff;

    assert_eq!(sealed.reveal(), None);
}

/// Verify debug output never contains the secret.
#[test]
fn test_encrypted_debug_is_masked() {
    let sealed = EncryptedValue::seal("hidden").unwrap();

    let rendered = format!("{:?}", sealed);

    assert!(!rendered.contains("hidden"));
    assert!(rendered.contains("EncryptedValue"));
}

// ============================================================================
// TemporaryValue
// ============================================================================

/// Verify a budget of two gives (value, value, empty, empty).
#[test]
fn test_temporary_budget_exhaustion() {
    let value = TemporaryValue::new(LeafPayload::Plain(Some("token".to_string())), 2);

    assert_eq!(value.access().as_deref(), Some("token"));
    assert_eq!(value.remaining(), 1);
    assert!(!value.is_exhausted());

    assert_eq!(value.access().as_deref(), Some("token"));
    assert!(value.is_exhausted());

    assert_eq!(value.access(), None);
    assert_eq!(value.access(), None);
    assert_eq!(value.remaining(), 0);
}

/// Verify a zero budget never holds the payload.
#[test]
fn test_temporary_zero_budget() {
    let value = TemporaryValue::new(LeafPayload::Plain(Some("token".to_string())), 0);

    assert!(value.is_exhausted());
    assert_eq!(value.access(), None);
}

/// Verify a temporary value can wrap an encrypted one.
#[test]
fn test_temporary_wraps_encrypted_payload() {
    let sealed = Arc::new(EncryptedValue::seal("layered").unwrap());
    let value = TemporaryValue::new(LeafPayload::Encrypted(sealed), 1);

    assert_eq!(value.access().as_deref(), Some("layered"));
    assert_eq!(value.access(), None);
}

/// Verify concurrent readers never get more reads than the budget allows.
#[test]
fn test_temporary_budget_is_shared_across_threads() {
    let value = Arc::new(TemporaryValue::new(
        LeafPayload::Plain(Some("shared".to_string())),
        5,
    ));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let value = Arc::clone(&value);
            std::thread::spawn(move || value.access())
        })
        .collect();

    let successes = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .count();

    assert_eq!(successes, 5);
}
