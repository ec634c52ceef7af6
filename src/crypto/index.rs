// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keyed digests for equality-only secondary indexes.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{encode_blob, MasterKey};

type HmacSha256 = Hmac<Sha256>;

const INDEX_SALT_LABEL: &[u8] = b"pii-vault/index-salt/v1";

/// Derive the index salt from the master key.
pub(crate) fn derive_index_salt(master: &MasterKey) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(master.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(INDEX_SALT_LABEL);
    mac.finalize().into_bytes().into()
}

/// HMAC-SHA256 of `value` under `salt`, base64-encoded.
///
/// Identical inputs under the same salt always produce the same digest.
pub fn hash_index(salt: &[u8], value: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC accepts keys of any length");
    mac.update(value.as_bytes());
    encode_blob(&mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_salt() {
        let salt = b"0123456789abcdef0123456789abcdef";
        assert_eq!(hash_index(salt, "abc"), hash_index(salt, "abc"));
    }

    #[test]
    fn equal_digest_iff_equal_value() {
        let salt = b"0123456789abcdef0123456789abcdef";
        let values = ["abc", "abd", "ABC", "", "abc ", "user@example.com"];
        for a in values {
            for b in values {
                assert_eq!(hash_index(salt, a) == hash_index(salt, b), a == b, "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn salt_changes_digest() {
        assert_ne!(hash_index(b"salt-one", "abc"), hash_index(b"salt-two", "abc"));
    }

    #[test]
    fn digest_does_not_contain_plaintext() {
        let digest = hash_index(b"salt", "user@example.com");
        assert!(!digest.contains("user"));
        // 32-byte MAC, padded base64
        assert_eq!(digest.len(), 44);
    }
}
