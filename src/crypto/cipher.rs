// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-256-GCM sealing for record keys and record payloads.
//!
//! Sealed layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! Wrapped record keys and payloads use different AAD labels, so a wrapped
//! key can never be opened as a payload or the other way round.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use super::{CryptoError, CryptoResult, MasterKey};

const WRAP_AAD: &[u8] = b"pii-vault/record-key/v1";
const PAYLOAD_AAD: &[u8] = b"pii-vault/payload/v1";

/// Per-record data key. Zeroised on drop.
pub struct RecordKey(Zeroizing<[u8; 32]>);

impl RecordKey {
    pub(crate) fn generate(rng: &SystemRandom) -> CryptoResult<Self> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        rng.fill(bytes.as_mut_slice())
            .map_err(|_| CryptoError::Random)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RecordKey(..)")
    }
}

fn seal(key: &[u8], aad: &[u8], plaintext: &[u8], rng: &SystemRandom) -> CryptoResult<Vec<u8>> {
    let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| CryptoError::Key)?;
    let sealing_key = LessSafeKey::new(unbound);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| CryptoError::Random)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| CryptoError::Key)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);
    Ok(sealed)
}

fn open(key: &[u8], aad: &[u8], sealed: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < NONCE_LEN + AES_256_GCM.tag_len() {
        return Err(CryptoError::Decrypt);
    }
    let unbound = UnboundKey::new(&AES_256_GCM, key).map_err(|_| CryptoError::Decrypt)?;
    let opening_key = LessSafeKey::new(unbound);

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CryptoError::Decrypt)?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| CryptoError::Decrypt)?;
    Ok(plaintext.to_vec())
}

/// Wrap a record key under the master key.
pub fn wrap_record_key(
    master: &MasterKey,
    record_key: &RecordKey,
    rng: &SystemRandom,
) -> CryptoResult<Vec<u8>> {
    seal(master.as_bytes(), WRAP_AAD, record_key.as_bytes(), rng)
}

/// Unwrap a record key. Any failure is reported as [`CryptoError::Key`].
pub fn unwrap_record_key(master: &MasterKey, wrapped: &[u8]) -> CryptoResult<RecordKey> {
    let plain = Zeroizing::new(
        open(master.as_bytes(), WRAP_AAD, wrapped).map_err(|_| CryptoError::Key)?,
    );
    let bytes: [u8; 32] = plain.as_slice().try_into().map_err(|_| CryptoError::Key)?;
    Ok(RecordKey(Zeroizing::new(bytes)))
}

/// Authenticated encryption of a payload under a record key.
pub fn encrypt(key: &RecordKey, plaintext: &[u8], rng: &SystemRandom) -> CryptoResult<Vec<u8>> {
    seal(key.as_bytes(), PAYLOAD_AAD, plaintext, rng)
}

/// Decrypt a payload. Fails closed on any tag mismatch.
pub fn decrypt(key: &RecordKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    open(key.as_bytes(), PAYLOAD_AAD, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_master_key;

    fn rng() -> SystemRandom {
        SystemRandom::new()
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let rng = rng();
        let key = RecordKey::generate(&rng).unwrap();
        for value in [&b""[..], b"a", br#"{"email":"a@b.c","name":"tom"}"#] {
            let sealed = encrypt(&key, value, &rng).unwrap();
            assert_eq!(decrypt(&key, &sealed).unwrap(), value);
        }
    }

    #[test]
    fn decrypt_with_other_key_fails() {
        let rng = rng();
        let key = RecordKey::generate(&rng).unwrap();
        let other = RecordKey::generate(&rng).unwrap();
        let sealed = encrypt(&key, b"secret", &rng).unwrap();

        assert!(matches!(decrypt(&other, &sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let rng = rng();
        let key = RecordKey::generate(&rng).unwrap();
        let mut sealed = encrypt(&key, b"secret", &rng).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;

        assert!(matches!(decrypt(&key, &sealed), Err(CryptoError::Decrypt)));
        assert!(matches!(decrypt(&key, &sealed[..5]), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let rng = rng();
        let key = RecordKey::generate(&rng).unwrap();
        let a = encrypt(&key, b"same", &rng).unwrap();
        let b = encrypt(&key, b"same", &rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrapped_key_is_not_a_payload() {
        let rng = rng();
        let master = generate_master_key().unwrap();
        let record_key = RecordKey::generate(&rng).unwrap();
        let wrapped = wrap_record_key(&master, &record_key, &rng).unwrap();

        let unwrapped = unwrap_record_key(&master, &wrapped).unwrap();
        assert_eq!(unwrapped.as_bytes(), record_key.as_bytes());

        // A payload sealed under the same bytes must not unwrap as a key.
        let as_payload_key = RecordKey(Zeroizing::new(*master.as_bytes()));
        assert!(decrypt(&as_payload_key, &wrapped).is_err());
    }

    #[test]
    fn unwrap_with_wrong_master_fails_with_key_error() {
        let rng = rng();
        let master = generate_master_key().unwrap();
        let other = generate_master_key().unwrap();
        let record_key = RecordKey::generate(&rng).unwrap();
        let wrapped = wrap_record_key(&master, &record_key, &rng).unwrap();

        assert!(matches!(
            unwrap_record_key(&other, &wrapped),
            Err(CryptoError::Key)
        ));
    }
}
