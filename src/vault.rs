//! Credential vault for remote login secrets
//!
//! Secrets are sealed with AES-256-GCM under a single process-wide key. The
//! stored form is `base64(nonce || ciphertext || tag)`, so a ciphertext is
//! self-contained and can be produced by any collaborator holding the key.
//!
//! The key is read-only configuration: it is loaded once at startup and never
//! rotated while the engine runs.

use std::fmt;

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::util::get_encryption_key;

/// Length of the AES-256 key in bytes.
pub const KEY_LEN: usize = 32;
/// Length of the AES-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;
/// Additional authenticated data: envelope version byte.
const AAD: &[u8] = &[1];

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("vault key is not configured")]
    MissingKey,

    #[error("vault key is invalid: {0}")]
    InvalidKey(String),

    #[error("ciphertext is malformed: {0}")]
    MalformedCiphertext(String),

    #[error("decryption failed, wrong key or corrupted data")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decrypted secret is not valid UTF-8")]
    NotUtf8,
}

/// A decrypted login secret, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Clone)]
pub struct Vault {
    cipher: Aes256Gcm,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault").finish_non_exhaustive()
    }
}

impl Vault {
    /// Build a vault from a base64 encoded 32 byte key.
    pub fn from_base64_key(key: &str) -> Result<Self, VaultError> {
        let mut bytes = BASE64
            .decode(key.trim())
            .map_err(|e| VaultError::InvalidKey(e.to_string()))?;

        if bytes.len() != KEY_LEN {
            let len = bytes.len();
            bytes.zeroize();
            return Err(VaultError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {len}"
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|e| VaultError::InvalidKey(e.to_string()));
        bytes.zeroize();

        Ok(Self { cipher: cipher? })
    }

    /// Build a vault from the `ENCRYPTION_KEY` environment variable.
    pub fn from_env() -> Result<Self, VaultError> {
        let key = get_encryption_key().ok_or(VaultError::MissingKey)?;
        Self::from_base64_key(&key)
    }

    /// Generate a fresh random key, base64 encoded.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        let encoded = BASE64.encode(key);
        key.zeroize();
        encoded
    }

    pub fn encrypt(&self, secret: &[u8]) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: secret,
                    aad: AAD,
                },
            )
            .map_err(|_| VaultError::EncryptionFailed)?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + sealed.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&sealed);

        Ok(BASE64.encode(envelope))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<Secret, VaultError> {
        let envelope = BASE64
            .decode(ciphertext.trim())
            .map_err(|e| VaultError::MalformedCiphertext(e.to_string()))?;

        // nonce plus at least the 16 byte tag
        if envelope.len() < NONCE_LEN + 16 {
            return Err(VaultError::MalformedCiphertext(format!(
                "envelope too short ({} bytes)",
                envelope.len()
            )));
        }

        let (nonce_bytes, sealed) = envelope.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: sealed,
                    aad: AAD,
                },
            )
            .map_err(|_| VaultError::DecryptionFailed)?;

        match String::from_utf8(plaintext) {
            Ok(secret) => Ok(Secret(secret)),
            Err(e) => {
                e.into_bytes().zeroize();
                Err(VaultError::NotUtf8)
            }
        }
    }
}
