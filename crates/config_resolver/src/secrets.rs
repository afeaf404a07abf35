//! Decorated leaf payloads for sensitive values.
//!
//! [`EncryptedValue`] keeps a value sealed with AES-256-GCM under a key and
//! nonce generated for that value alone, and decrypts it on every read.
//! [`TemporaryValue`] hands out a value a limited number of times and then
//! drops it. Key material and plaintext live in `secrecy` containers, which
//! zeroize their memory when dropped.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::zeroize::Zeroize;
use secrecy::{ExposeSecret, SecretBox, SecretString};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::warn;

use crate::node::LeafPayload;

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Errors raised while sealing a secret.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("Failed to initialize the cipher: {reason}")]
    InvalidKey { reason: String },

    #[error("Failed to seal the secret value")]
    SealFailed,
}

/// A value held encrypted in memory.
pub struct EncryptedValue {
    key: SecretBox<[u8; KEY_LEN]>,
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl EncryptedValue {
    /// Seals `plaintext` under a freshly generated key and nonce.
    ///
    /// # Errors
    ///
    /// Returns `SecretError` if the cipher cannot be initialized or the
    /// value cannot be encrypted.
    pub fn seal(plaintext: &str) -> Result<Self, SecretError> {
        let mut key = [0u8; KEY_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| SecretError::InvalidKey {
            reason: e.to_string(),
        });
        let sealed = cipher.and_then(|cipher| {
            cipher
                .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
                .map_err(|_| SecretError::SealFailed)
        });

        let key_box = SecretBox::new(Box::new(key));
        key.zeroize();

        Ok(Self {
            key: key_box,
            nonce,
            ciphertext: sealed?,
        })
    }

    /// Decrypts the value. A failure is logged and yields `None`.
    pub fn reveal(&self) -> Option<String> {
        let cipher = match Aes256Gcm::new_from_slice(self.key.expose_secret()) {
            Ok(cipher) => cipher,
            Err(e) => {
                warn!("Failed to initialize cipher for secret value: {}", e);
                return None;
            }
        };

        let plaintext =
            match cipher.decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_slice()) {
                Ok(plaintext) => plaintext,
                Err(_) => {
                    warn!("Failed to decrypt secret value");
                    return None;
                }
            };

        match String::from_utf8(plaintext) {
            Ok(value) => Some(value),
            Err(e) => {
                e.into_bytes().zeroize();
                warn!("Decrypted secret value is not valid UTF-8");
                None
            }
        }
    }
}

impl fmt::Debug for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedValue")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

enum SecretPayload {
    Plain(Option<SecretString>),
    Encrypted(Arc<EncryptedValue>),
    Nested(Arc<TemporaryValue>),
}

impl SecretPayload {
    fn from_leaf(payload: LeafPayload) -> Self {
        match payload {
            LeafPayload::Plain(value) => Self::Plain(value.map(SecretString::from)),
            LeafPayload::Encrypted(encrypted) => Self::Encrypted(encrypted),
            LeafPayload::Temporary(temporary) => Self::Nested(temporary),
        }
    }

    fn read(&self) -> Option<String> {
        match self {
            Self::Plain(value) => value.as_ref().map(|s| s.expose_secret().to_string()),
            Self::Encrypted(encrypted) => encrypted.reveal(),
            Self::Nested(temporary) => temporary.access(),
        }
    }
}

struct TemporaryState {
    remaining: u32,
    payload: Option<SecretPayload>,
}

/// A value that may be read a limited number of times.
///
/// Each read spends one access. The read that spends the last access moves
/// the payload out and drops it; every later read returns `None`.
///
/// # Examples
///
/// ```rust
/// use config_resolver::{LeafPayload, TemporaryValue};
///
/// let value = TemporaryValue::new(LeafPayload::Plain(Some("hunter2".to_string())), 2);
///
/// assert_eq!(value.access().as_deref(), Some("hunter2"));
/// assert_eq!(value.access().as_deref(), Some("hunter2"));
/// assert_eq!(value.access(), None);
/// assert!(value.is_exhausted());
/// ```
pub struct TemporaryValue {
    state: Mutex<TemporaryState>,
}

impl TemporaryValue {
    pub fn new(payload: LeafPayload, reads: u32) -> Self {
        let payload = (reads > 0).then(|| SecretPayload::from_leaf(payload));
        Self {
            state: Mutex::new(TemporaryState {
                remaining: reads,
                payload,
            }),
        }
    }

    /// Reads the value, spending one access.
    pub fn access(&self) -> Option<String> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.remaining == 0 {
            return None;
        }

        state.remaining -= 1;
        let value = state.payload.as_ref().and_then(SecretPayload::read);
        if state.remaining == 0 {
            drop(state.payload.take());
        }
        value
    }

    pub fn remaining(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remaining
    }

    /// Returns `true` once the payload has been discarded.
    pub fn is_exhausted(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .payload
            .is_none()
    }
}

impl fmt::Debug for TemporaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryValue")
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}
