// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-app user records.
//!
//! An app keeps its own JSON object about a user, next to the profile. The
//! object is encrypted with the user's record key, so it becomes unreadable
//! together with the profile once the user is forgotten. Each user has at
//! most one record per app.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::users::{merge_patch, UserRepository};
use crate::crypto::{CryptoError, KeyManager, RecordKey};
use crate::error::{VaultError, VaultResult};
use crate::storage::{Record, Store, StoreError, Table};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAppRecord {
    pub key: String,
    /// Owning user.
    pub token: String,
    pub app: String,
    /// `<token>:<app>`, unique.
    pub tokenapp: String,
    /// Encrypted app data.
    pub data: String,
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
}

impl Record for UserAppRecord {
    const TABLE: Table = Table::Userapps;
    const KEY: &'static str = "key";

    fn key(&self) -> &str {
        &self.key
    }

    fn set_key(&mut self, key: String) {
        self.key = key;
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("token", self.token.clone()),
            ("app", self.app.clone()),
            ("tokenapp", self.tokenapp.clone()),
        ]
    }
}

fn tokenapp(token: &str, app: &str) -> String {
    format!("{token}:{app}")
}

fn require_object(data: &Value) -> VaultResult<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(VaultError::Validation("app record must be a JSON object".into()))
    }
}

pub struct UserAppRepository<'a> {
    store: &'a Store,
    keys: &'a KeyManager,
    users: UserRepository<'a>,
}

impl<'a> UserAppRepository<'a> {
    pub fn new(store: &'a Store, keys: &'a KeyManager, region: &'a str) -> Self {
        Self {
            store,
            keys,
            users: UserRepository::new(store, keys, region),
        }
    }

    fn seal(&self, key: &RecordKey, data: &Value) -> VaultResult<String> {
        let plain = serde_json::to_vec(data).map_err(|e| VaultError::Validation(e.to_string()))?;
        Ok(self.keys.encrypt(key, &plain)?)
    }

    fn open(&self, key: &RecordKey, blob: &str) -> VaultResult<Value> {
        let plain = self.keys.decrypt(key, blob)?;
        serde_json::from_slice(&plain).map_err(|_| CryptoError::Decrypt.into())
    }

    fn find(&self, user_token: &str, app: &str) -> VaultResult<UserAppRecord> {
        self.store
            .get("tokenapp", &tokenapp(user_token, app))?
            .ok_or(VaultError::NotFound)
    }

    /// Store the first record of `app` for a user. A second one for the
    /// same pair is rejected.
    pub fn create(&self, user_token: &str, app: &str, data: &Value) -> VaultResult<()> {
        require_object(data)?;
        let key = self.users.record_key(user_token)?;
        let row = UserAppRecord {
            key: String::new(),
            token: user_token.to_string(),
            app: app.to_string(),
            tokenapp: tokenapp(user_token, app),
            data: self.seal(&key, data)?,
            created: Utc::now().timestamp(),
            updated: None,
        };
        match self.store.create_unique(row, &["tokenapp"]) {
            Ok(_) => {
                tracing::info!(token = %user_token, app = %app, "App record created");
                Ok(())
            }
            Err(StoreError::Duplicate(_)) => {
                Err(VaultError::Validation("app record already exists".into()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Decrypted data of one app record.
    pub fn get(&self, user_token: &str, app: &str) -> VaultResult<Value> {
        let row = self.find(user_token, app)?;
        let key = self.users.record_key(user_token)?;
        self.open(&key, &row.data)
    }

    /// Merge `patch` into the app record. Returns the old and new data.
    pub fn change(&self, user_token: &str, app: &str, patch: &Value) -> VaultResult<(Value, Value)> {
        require_object(patch)?;
        let row = self.find(user_token, app)?;
        let key = self.users.record_key(user_token)?;

        let mut outcome = None;
        self.store
            .update::<UserAppRecord, _, VaultError>(&row.key, &[], |record| {
                let old = self.open(&key, &record.data)?;
                let mut new = old.clone();
                merge_patch(&mut new, patch);
                record.data = self.seal(&key, &new)?;
                record.updated = Some(Utc::now().timestamp());
                outcome = Some((old, new));
                Ok(())
            })?;
        outcome.ok_or(VaultError::NotFound)
    }

    /// App names holding a record for the user, in creation order.
    pub fn list_for_user(&self, user_token: &str) -> VaultResult<Vec<String>> {
        let rows: Vec<UserAppRecord> = self.store.list("token", user_token, 0, 0)?;
        Ok(rows.into_iter().map(|row| row.app).collect())
    }

    /// Every app name in use, sorted.
    pub fn list_apps(&self) -> VaultResult<Vec<String>> {
        let apps: BTreeSet<String> = self
            .store
            .scan::<UserAppRecord>()?
            .into_iter()
            .map(|row| row.app)
            .collect();
        Ok(apps.into_iter().collect())
    }

    /// Drop all app records of a user.
    pub fn delete_for_user(&self, user_token: &str) -> VaultResult<bool> {
        let deleted = self.store.delete::<UserAppRecord>("token", user_token)?;
        if deleted {
            tracing::info!(token = %user_token, "App records deleted");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::test_key_manager;
    use crate::storage::database::tests::temp_store;
    use serde_json::json;

    fn user(store: &Store, keys: &KeyManager, name: &str) -> String {
        UserRepository::new(store, keys, "US")
            .create(&json!({ "name": name }))
            .unwrap()
            .0
    }

    #[test]
    fn create_get_and_change() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let token = user(&store, &keys, "Ada");
        let repo = UserAppRepository::new(&store, &keys, "US");

        repo.create(&token, "shop", &json!({"size": "M", "color": "red"})).unwrap();
        assert_eq!(repo.get(&token, "shop").unwrap()["size"], "M");

        let (old, new) = repo
            .change(&token, "shop", &json!({"size": "L", "color": null}))
            .unwrap();
        assert_eq!(old["size"], "M");
        assert_eq!(new, json!({"size": "L"}));
        assert_eq!(repo.get(&token, "shop").unwrap(), json!({"size": "L"}));
    }

    #[test]
    fn data_is_not_stored_in_clear() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let token = user(&store, &keys, "Ada");
        let repo = UserAppRepository::new(&store, &keys, "US");

        repo.create(&token, "shop", &json!({"secret": "plum"})).unwrap();
        let row: UserAppRecord = store.get("token", &token).unwrap().unwrap();
        assert!(!row.data.contains("plum"));
    }

    #[test]
    fn one_record_per_user_and_app() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let token = user(&store, &keys, "Ada");
        let repo = UserAppRepository::new(&store, &keys, "US");

        repo.create(&token, "shop", &json!({})).unwrap();
        assert!(matches!(
            repo.create(&token, "shop", &json!({})),
            Err(VaultError::Validation(ref m)) if m == "app record already exists"
        ));
        assert!(matches!(
            repo.create(&token, "crm", &json!([1, 2])),
            Err(VaultError::Validation(_))
        ));
    }

    #[test]
    fn missing_user_or_record_is_not_found() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let token = user(&store, &keys, "Ada");
        let repo = UserAppRepository::new(&store, &keys, "US");

        assert!(matches!(repo.get(&token, "shop"), Err(VaultError::NotFound)));
        assert!(matches!(
            repo.change(&token, "shop", &json!({"a": 1})),
            Err(VaultError::NotFound)
        ));
        assert!(matches!(
            repo.create("6f9619ff-8b86-4011-b42d-00c04fc964ff", "shop", &json!({})),
            Err(VaultError::NotFound)
        ));
    }

    #[test]
    fn listing_and_deleting() {
        let (store, _dir) = temp_store();
        let keys = test_key_manager();
        let ada = user(&store, &keys, "Ada");
        let bob = user(&store, &keys, "Bob");
        let repo = UserAppRepository::new(&store, &keys, "US");

        repo.create(&ada, "shop", &json!({})).unwrap();
        repo.create(&ada, "crm", &json!({})).unwrap();
        repo.create(&bob, "shop", &json!({})).unwrap();

        assert_eq!(repo.list_for_user(&ada).unwrap(), vec!["shop", "crm"]);
        assert_eq!(repo.list_apps().unwrap(), vec!["crm", "shop"]);

        assert!(repo.delete_for_user(&ada).unwrap());
        assert!(repo.list_for_user(&ada).unwrap().is_empty());
        assert_eq!(repo.list_apps().unwrap(), vec!["shop"]);
        assert!(!repo.delete_for_user(&ada).unwrap());
    }
}
