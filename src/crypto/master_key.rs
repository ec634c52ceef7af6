// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Master key material.
//!
//! The key lives in a heap page that is locked into RAM (`mlock`) so it is
//! never written to swap, and is zeroised before the page is unlocked.

use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroize;

use super::{CryptoError, CryptoResult};

/// Master key length in bytes (AES-256).
pub const MASTER_KEY_LEN: usize = 32;

/// Length of the hex form accepted on the command line.
pub const MASTER_KEY_HEX_LEN: usize = MASTER_KEY_LEN * 2;

pub struct MasterKey {
    bytes: Box<[u8; MASTER_KEY_LEN]>,
    locked: bool,
}

impl MasterKey {
    fn from_bytes(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        let mut key = Self {
            bytes: Box::new(bytes),
            locked: false,
        };
        key.locked = lock_memory(key.bytes.as_ptr(), MASTER_KEY_LEN);
        if !key.locked {
            tracing::warn!("Could not lock master key memory; it may be swapped to disk");
        }
        key
    }

    /// Parse the operator-supplied hex key.
    pub fn from_hex(hex: &str) -> CryptoResult<Self> {
        let hex = hex.trim();
        if hex.len() != MASTER_KEY_HEX_LEN {
            return Err(CryptoError::InvalidMasterKey(format!(
                "expected {MASTER_KEY_HEX_LEN} hex characters, got {}",
                hex.len()
            )));
        }

        let mut bytes = [0u8; MASTER_KEY_LEN];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok());
            match pair {
                Some(b) => bytes[i] = b,
                None => {
                    bytes.zeroize();
                    return Err(CryptoError::InvalidMasterKey(
                        "non-hex character".to_string(),
                    ));
                }
            }
        }

        let key = Self::from_bytes(bytes);
        bytes.zeroize();
        Ok(key)
    }

    /// Hex form, printed once to the operator at init time.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub(crate) fn as_bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.bytes
    }
}

/// Generate fresh master key material from the OS CSPRNG.
pub fn generate_master_key() -> CryptoResult<MasterKey> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; MASTER_KEY_LEN];
    rng.fill(&mut bytes).map_err(|_| CryptoError::Random)?;
    let key = MasterKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
        if self.locked {
            unlock_memory(self.bytes.as_ptr(), MASTER_KEY_LEN);
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
fn lock_memory(ptr: *const u8, len: usize) -> bool {
    // SAFETY: `ptr` points at a live heap allocation of exactly `len` bytes
    // owned by the MasterKey being constructed.
    unsafe { libc::mlock(ptr as *const libc::c_void, len) == 0 }
}

#[cfg(unix)]
fn unlock_memory(ptr: *const u8, len: usize) {
    // SAFETY: same allocation that was passed to `mlock`, still alive.
    unsafe {
        libc::munlock(ptr as *const libc::c_void, len);
    }
}

#[cfg(not(unix))]
fn lock_memory(_ptr: *const u8, _len: usize) -> bool {
    false
}

#[cfg(not(unix))]
fn unlock_memory(_ptr: *const u8, _len: usize) {}
