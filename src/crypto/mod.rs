// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Manager
//!
//! Two-level key hierarchy for personal records:
//!
//! ```text
//! MasterKey (process memory only, mlock'ed)
//!   ├── index salt  = HMAC-SHA256(master, "index-salt")
//!   └── wraps RecordKey (one per user record, stored wrapped)
//!         └── encrypts profile, session meta, request change payloads
//! ```
//!
//! - Payloads use AES-256-GCM (`ring`). Decryption fails closed.
//! - Secondary indexes are keyed HMAC-SHA256 digests, so equality lookups
//!   work without storing the plaintext.
//! - The master key is printed once at `--init` and never persisted.

pub mod cipher;
pub mod index;
pub mod master_key;

use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

pub use cipher::{decrypt, encrypt, unwrap_record_key, wrap_record_key, RecordKey};
pub use index::hash_index;
pub use master_key::{generate_master_key, MasterKey, MASTER_KEY_HEX_LEN, MASTER_KEY_LEN};

/// Errors raised by the key manager.
///
/// `Key` and `Decrypt` must never reach a caller with detail; the API layer
/// reports them exactly like a missing record.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("record key could not be unwrapped")]
    Key,

    #[error("ciphertext failed authentication")]
    Decrypt,

    #[error("system random generator failed")]
    Random,

    #[error("invalid master key: {0}")]
    InvalidMasterKey(String),

    #[error("invalid encoding: {0}")]
    Encoding(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Holds the master key and everything derived from it.
///
/// Shared read-only by every request task; nothing here is mutated after
/// startup.
pub struct KeyManager {
    master: MasterKey,
    index_salt: Zeroizing<[u8; 32]>,
    rng: SystemRandom,
}

impl KeyManager {
    pub fn new(master: MasterKey) -> Self {
        let index_salt = Zeroizing::new(index::derive_index_salt(&master));
        Self {
            master,
            index_salt,
            rng: SystemRandom::new(),
        }
    }

    /// Fresh random key for a new user record.
    pub fn new_record_key(&self) -> CryptoResult<RecordKey> {
        RecordKey::generate(&self.rng)
    }

    pub fn wrap_record_key(&self, key: &RecordKey) -> CryptoResult<String> {
        let wrapped = wrap_record_key(&self.master, key, &self.rng)?;
        Ok(encode_blob(&wrapped))
    }

    pub fn unwrap_record_key(&self, wrapped: &str) -> CryptoResult<RecordKey> {
        let bytes = decode_blob(wrapped).map_err(|_| CryptoError::Key)?;
        unwrap_record_key(&self.master, &bytes)
    }

    /// Encrypt under a record key, returning the base64 blob stored in rows.
    pub fn encrypt(&self, key: &RecordKey, plaintext: &[u8]) -> CryptoResult<String> {
        let sealed = encrypt(key, plaintext, &self.rng)?;
        Ok(encode_blob(&sealed))
    }

    pub fn decrypt(&self, key: &RecordKey, blob: &str) -> CryptoResult<Vec<u8>> {
        let bytes = decode_blob(blob).map_err(|_| CryptoError::Decrypt)?;
        decrypt(key, &bytes)
    }

    /// Keyed digest for an exact-match secondary index.
    pub fn hash_index(&self, value: &str) -> String {
        hash_index(self.index_salt.as_slice(), value)
    }

    /// Uniformly random decimal code with `digits` digits (leading zeros kept).
    pub fn random_code(&self, digits: u32) -> CryptoResult<String> {
        let modulus = 10u32.pow(digits);
        // Reject values in the biased tail so every code is equally likely.
        let limit = u32::MAX - (u32::MAX % modulus);
        loop {
            let mut buf = [0u8; 4];
            self.rng.fill(&mut buf).map_err(|_| CryptoError::Random)?;
            let value = u32::from_be_bytes(buf);
            if value < limit {
                return Ok(format!("{:0width$}", value % modulus, width = digits as usize));
            }
        }
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager").finish_non_exhaustive()
    }
}

pub(crate) fn encode_blob(bytes: &[u8]) -> String {
    use base64ct::{Base64, Encoding};
    Base64::encode_string(bytes)
}

pub(crate) fn decode_blob(blob: &str) -> CryptoResult<Vec<u8>> {
    use base64ct::{Base64, Encoding};
    Base64::decode_vec(blob).map_err(|e| CryptoError::Encoding(e.to_string()))
}

#[cfg(test)]
pub(crate) fn test_key_manager() -> KeyManager {
    KeyManager::new(generate_master_key().expect("master key"))
}
