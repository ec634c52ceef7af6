// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User records.
//!
//! The profile is an arbitrary JSON object, encrypted with a per-user
//! record key. Only the `login`, `email` and `phone` fields are indexed, and
//! only as keyed digests.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;

use crate::auth::AuthError;
use crate::crypto::{CryptoError, KeyManager, RecordKey};
use crate::error::{VaultError, VaultResult};
use crate::storage::{Record, Store, Table};
use crate::validation::{normalize_email, normalize_phone, IndexMode};

/// Index fields that must be unique across all users.
const UNIQUE_INDEXES: [&str; 3] = ["login", "email", "phone"];

/// A user row. Everything personal is either encrypted or hashed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub token: String,
    /// Record key wrapped under the master key.
    pub key: String,
    /// Encrypted profile JSON.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Digest of the pending login code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempcode_exp: Option<i64>,
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
}

impl Record for UserRecord {
    const TABLE: Table = Table::Users;
    const KEY: &'static str = "token";

    fn key(&self) -> &str {
        &self.token
    }

    fn set_key(&mut self, key: String) {
        self.token = key;
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        if let Some(login) = &self.login {
            entries.push(("login", login.clone()));
        }
        if let Some(email) = &self.email {
            entries.push(("email", email.clone()));
        }
        if let Some(phone) = &self.phone {
            entries.push(("phone", phone.clone()));
        }
        entries
    }
}

/// Hashed lookup values of one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileIndexes {
    pub login: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ProfileIndexes {
    /// `(mode, digest)` pairs, used to link consent rows.
    pub fn hashed_identities(&self) -> Vec<(IndexMode, String)> {
        let mut identities = Vec::new();
        if let Some(email) = &self.email {
            identities.push((IndexMode::Email, email.clone()));
        }
        if let Some(phone) = &self.phone {
            identities.push((IndexMode::Phone, phone.clone()));
        }
        identities
    }

    fn apply(&self, record: &mut UserRecord) {
        record.login = self.login.clone();
        record.email = self.email.clone();
        record.phone = self.phone.clone();
    }
}

/// Outcome of a successful profile change.
#[derive(Debug, Clone)]
pub struct ProfileChange {
    pub old: Value,
    pub new: Value,
    pub indexes: ProfileIndexes,
}

/// RFC 7396 merge: `null` removes a key, objects merge recursively, any
/// other value replaces.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                map.remove(key);
            } else {
                merge_patch(map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn encode_json(value: &Value) -> VaultResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| VaultError::Validation(e.to_string()))
}

/// Repository for user records.
pub struct UserRepository<'a> {
    store: &'a Store,
    keys: &'a KeyManager,
    /// Region used for phone numbers without a country code.
    region: &'a str,
}

impl<'a> UserRepository<'a> {
    pub fn new(store: &'a Store, keys: &'a KeyManager, region: &'a str) -> Self {
        Self {
            store,
            keys,
            region,
        }
    }

    /// Hash the string-valued `login`, `email` and `phone` fields.
    /// Non-string or unparseable values are not indexed.
    pub fn profile_indexes(&self, profile: &Map<String, Value>) -> ProfileIndexes {
        let text = |name: &str| profile.get(name).and_then(Value::as_str);
        ProfileIndexes {
            login: text("login")
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| self.keys.hash_index(v)),
            email: text("email")
                .and_then(normalize_email)
                .map(|v| self.keys.hash_index(&v)),
            phone: text("phone")
                .and_then(|v| normalize_phone(v, self.region))
                .map(|v| self.keys.hash_index(&v)),
        }
    }

    /// Create a user. Fails with `duplicate index: <name>` if another user
    /// already holds the same login, email or phone; no row is written then.
    pub fn create(&self, profile: &Value) -> VaultResult<(String, ProfileIndexes)> {
        let object = profile
            .as_object()
            .ok_or_else(|| VaultError::Validation("user profile must be a JSON object".into()))?;
        let indexes = self.profile_indexes(object);

        let record_key = self.keys.new_record_key()?;
        let mut record = UserRecord {
            token: String::new(),
            key: self.keys.wrap_record_key(&record_key)?,
            data: self.keys.encrypt(&record_key, &encode_json(profile)?)?,
            login: None,
            email: None,
            phone: None,
            tempcode: None,
            tempcode_exp: None,
            created: Utc::now().timestamp(),
            updated: None,
        };
        indexes.apply(&mut record);

        let token = self.store.create_unique(record, &UNIQUE_INDEXES)?;
        tracing::info!(token = %token, "User record created");
        Ok((token, indexes))
    }

    /// Find a row by token or by an already-normalized address.
    pub fn find(&self, mode: IndexMode, address: &str) -> VaultResult<Option<UserRecord>> {
        let record = match mode {
            IndexMode::Token => self.store.get(UserRecord::KEY, address)?,
            other => self
                .store
                .get(other.as_str(), &self.keys.hash_index(address))?,
        };
        Ok(record)
    }

    pub fn find_by_token(&self, token: &str) -> VaultResult<UserRecord> {
        self.find(IndexMode::Token, token)?.ok_or(VaultError::NotFound)
    }

    fn open_profile(&self, key: &RecordKey, data: &str) -> VaultResult<Value> {
        let plain = self.keys.decrypt(key, data)?;
        serde_json::from_slice(&plain).map_err(|_| CryptoError::Decrypt.into())
    }

    /// Decrypt the profile of a row.
    pub fn profile(&self, record: &UserRecord) -> VaultResult<Value> {
        let key = self.keys.unwrap_record_key(&record.key)?;
        self.open_profile(&key, &record.data)
    }

    /// Token and decrypted profile. Missing rows are `NotFound`.
    pub fn get(&self, mode: IndexMode, address: &str) -> VaultResult<(String, Value)> {
        let record = self.find(mode, address)?.ok_or(VaultError::NotFound)?;
        let profile = self.profile(&record)?;
        Ok((record.token, profile))
    }

    /// Merge `patch` into the profile, re-index and re-encrypt, all in one
    /// write transaction.
    pub fn change(&self, token: &str, patch: &Value) -> VaultResult<ProfileChange> {
        if !patch.is_object() {
            return Err(VaultError::Validation(
                "user profile must be a JSON object".into(),
            ));
        }

        let mut outcome = None;
        let updated = self
            .store
            .update::<UserRecord, _, VaultError>(token, &UNIQUE_INDEXES, |record| {
                let key = self.keys.unwrap_record_key(&record.key)?;
                let old = self.open_profile(&key, &record.data)?;
                let mut new = old.clone();
                merge_patch(&mut new, patch);

                let indexes = match new.as_object() {
                    Some(object) => self.profile_indexes(object),
                    None => ProfileIndexes::default(),
                };
                indexes.apply(record);
                record.data = self.keys.encrypt(&key, &encode_json(&new)?)?;
                record.updated = Some(Utc::now().timestamp());

                outcome = Some(ProfileChange { old, new, indexes });
                Ok(())
            })?;

        match (updated, outcome) {
            (Some(_), Some(change)) => Ok(change),
            _ => Err(VaultError::NotFound),
        }
    }

    /// Delete the row. Returns the last profile if the row existed.
    ///
    /// Sessions, requests and shared records that reference the token are
    /// left in place; their encrypted parts are unreadable from now on.
    pub fn delete(&self, token: &str) -> VaultResult<Option<Value>> {
        let Some(record) = self.find(IndexMode::Token, token)? else {
            return Ok(None);
        };
        let last_profile = self.profile(&record).unwrap_or(Value::Null);
        if self.store.delete::<UserRecord>(UserRecord::KEY, token)? {
            tracing::info!(token = %token, "User record deleted");
            Ok(Some(last_profile))
        } else {
            Ok(None)
        }
    }

    /// Unwrapped record key of a user.
    pub fn record_key(&self, token: &str) -> VaultResult<RecordKey> {
        let record = self.find_by_token(token)?;
        Ok(self.keys.unwrap_record_key(&record.key)?)
    }

    /// Encrypt a payload under the user's record key.
    pub fn encrypt_for(&self, token: &str, plaintext: &[u8]) -> VaultResult<String> {
        let key = self.record_key(token)?;
        Ok(self.keys.encrypt(&key, plaintext)?)
    }

    pub fn decrypt_for(&self, token: &str, blob: &str) -> VaultResult<Vec<u8>> {
        let key = self.record_key(token)?;
        Ok(self.keys.decrypt(&key, blob)?)
    }

    /// Store the digest of a freshly issued login code.
    pub fn set_tempcode(&self, token: &str, code: &str, expires: i64) -> VaultResult<()> {
        let digest = self.keys.hash_index(code);
        self.store
            .update::<UserRecord, _, VaultError>(token, &[], |record| {
                record.tempcode = Some(digest);
                record.tempcode_exp = Some(expires);
                Ok(())
            })?
            .ok_or(VaultError::NotFound)?;
        Ok(())
    }

    /// Check a login code and clear it, so it can be used only once.
    ///
    /// The comparison is constant time. Wrong, expired or missing codes all
    /// fail with the same access-denied error.
    pub fn consume_tempcode(&self, token: &str, code: &str) -> VaultResult<()> {
        let digest = self.keys.hash_index(code);
        let now = Utc::now().timestamp();
        self.store
            .update::<UserRecord, _, VaultError>(token, &[], |record| {
                let stored = record.tempcode.as_deref().unwrap_or_default();
                let matches: bool = stored.as_bytes().ct_eq(digest.as_bytes()).into();
                let fresh = record.tempcode_exp.is_some_and(|exp| now <= exp);
                if !(matches && fresh && !stored.is_empty()) {
                    return Err(AuthError::new("login code mismatch or expired").into());
                }
                record.tempcode = None;
                record.tempcode_exp = None;
                Ok(())
            })?
            .ok_or_else(|| AuthError::new("login code for unknown user"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_key_manager;
    use crate::storage::database::tests::temp_store;
    use serde_json::json;

    #[test]
    fn create_and_get_by_every_index() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let repo = UserRepository::new(&store, &keys, "US");

        let profile = json!({"login": "tom", "email": "Tom@Example.com", "phone": "+14155550100", "name": "Tom"});
        let (token, _) = repo.create(&profile).unwrap();

        for (mode, address) in [
            (IndexMode::Token, token.as_str()),
            (IndexMode::Login, "tom"),
            (IndexMode::Email, "tom@example.com"),
            (IndexMode::Phone, "14155550100"),
        ] {
            let (found, data) = repo.get(mode, address).unwrap();
            assert_eq!(found, token);
            assert_eq!(data["name"], "Tom");
        }
    }

    #[test]
    fn stored_row_contains_no_plaintext() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let repo = UserRepository::new(&store, &keys, "US");

        let (token, _) = repo.create(&json!({"email": "secret@example.com"})).unwrap();
        let record = repo.find_by_token(&token).unwrap();
        let raw = serde_json::to_string(&record).unwrap();
        assert!(!raw.contains("secret"));
    }

    #[test]
    fn duplicate_login_is_rejected_without_second_row() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let repo = UserRepository::new(&store, &keys, "US");

        repo.create(&json!({"login": "abc"})).unwrap();
        let result = repo.create(&json!({"login": "abc", "name": "other"}));

        assert!(matches!(result, Err(VaultError::Validation(ref m)) if m == "duplicate index: login"));
        assert_eq!(store.count_all::<UserRecord>().unwrap(), 1);
    }

    #[test]
    fn non_string_index_fields_are_ignored() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let repo = UserRepository::new(&store, &keys, "US");

        for profile in [json!({"login": true}), json!({"login": 1}), json!({"login": null})] {
            let (_, indexes) = repo.create(&profile).unwrap();
            assert!(indexes.login.is_none());
        }
        let (_, indexes) = repo.create(&json!({"login": "1234"})).unwrap();
        assert!(indexes.login.is_some());
    }

    #[test]
    fn profile_must_be_object() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let repo = UserRepository::new(&store, &keys, "US");
        assert!(matches!(repo.create(&json!([1, 2])), Err(VaultError::Validation(_))));
    }

    #[test]
    fn change_merges_and_reindexes() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let repo = UserRepository::new(&store, &keys, "US");

        let (token, _) = repo
            .create(&json!({"email": "a@b.io", "name": "Ann", "city": "Paris"}))
            .unwrap();
        let change = repo
            .change(&token, &json!({"email": "ann@b.io", "city": null}))
            .unwrap();

        assert_eq!(change.old["email"], "a@b.io");
        assert_eq!(change.new, json!({"email": "ann@b.io", "name": "Ann"}));
        assert!(repo.find(IndexMode::Email, "a@b.io").unwrap().is_none());
        assert_eq!(repo.get(IndexMode::Email, "ann@b.io").unwrap().0, token);
    }

    #[test]
    fn change_cannot_steal_another_users_index() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let repo = UserRepository::new(&store, &keys, "US");

        repo.create(&json!({"login": "taken"})).unwrap();
        let (token, _) = repo.create(&json!({"login": "mine"})).unwrap();

        let result = repo.change(&token, &json!({"login": "taken"}));
        assert!(matches!(result, Err(VaultError::Validation(_))));
        assert_eq!(repo.get(IndexMode::Token, &token).unwrap().1["login"], "mine");
    }

    #[test]
    fn delete_returns_last_profile_once() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let repo = UserRepository::new(&store, &keys, "US");

        let (token, _) = repo.create(&json!({"name": "Bob"})).unwrap();
        let last = repo.delete(&token).unwrap().unwrap();
        assert_eq!(last["name"], "Bob");
        assert!(repo.delete(&token).unwrap().is_none());
        assert!(matches!(repo.get(IndexMode::Token, &token), Err(VaultError::NotFound)));
    }

    #[test]
    fn other_master_key_reads_as_crypto_error() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let other = test_key_manager();
        let (token, _) = UserRepository::new(&store, &keys, "US")
            .create(&json!({"name": "Eve"}))
            .unwrap();

        let result = UserRepository::new(&store, &other, "US").get(IndexMode::Token, &token);
        assert!(matches!(result, Err(VaultError::Crypto(CryptoError::Key))));
    }

    #[test]
    fn tempcode_is_single_use() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let repo = UserRepository::new(&store, &keys, "US");
        let (token, _) = repo.create(&json!({"email": "c@d.io"})).unwrap();

        repo.set_tempcode(&token, "123456", Utc::now().timestamp() + 600).unwrap();
        assert!(matches!(
            repo.consume_tempcode(&token, "654321"),
            Err(VaultError::Auth(_))
        ));
        repo.consume_tempcode(&token, "123456").unwrap();
        assert!(matches!(
            repo.consume_tempcode(&token, "123456"),
            Err(VaultError::Auth(_))
        ));
    }

    #[test]
    fn expired_tempcode_is_rejected() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let repo = UserRepository::new(&store, &keys, "US");
        let (token, _) = repo.create(&json!({"email": "e@f.io"})).unwrap();

        repo.set_tempcode(&token, "111111", Utc::now().timestamp() - 1).unwrap();
        assert!(matches!(
            repo.consume_tempcode(&token, "111111"),
            Err(VaultError::Auth(_))
        ));
    }

    #[test]
    fn merge_patch_replaces_non_objects() {
        let mut target = json!({"a": {"b": 1, "c": 2}, "d": [1]});
        merge_patch(&mut target, &json!({"a": {"b": null, "e": 3}, "d": "x"}));
        assert_eq!(target, json!({"a": {"c": 2, "e": 3}, "d": "x"}));
    }
}
