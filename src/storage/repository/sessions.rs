// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User sessions with encrypted metadata.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::users::UserRepository;
use crate::crypto::{CryptoError, KeyManager};
use crate::error::{VaultError, VaultResult};
use crate::expiration::capped_end_time;
use crate::storage::{Record, Store, StoreResult, Table};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub session: String,
    /// Owning user.
    pub token: String,
    /// Metadata encrypted with the owner's record key.
    pub meta: String,
    pub endtime: i64,
    /// Digest of the client IP, if one was given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clientipidx: Option<String>,
    pub created: i64,
}

impl Record for SessionRecord {
    const TABLE: Table = Table::Sessions;
    const KEY: &'static str = "session";

    fn key(&self) -> &str {
        &self.session
    }

    fn set_key(&mut self, key: String) {
        self.session = key;
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![("token", self.token.clone())];
        if let Some(ip) = &self.clientipidx {
            entries.push(("clientipidx", ip.clone()));
        }
        entries
    }

    fn expires_at(&self) -> Option<i64> {
        Some(self.endtime)
    }
}

/// A decrypted session as returned to callers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionView {
    pub session: String,
    pub created: i64,
    pub endtime: i64,
    pub meta: Value,
}

pub struct SessionRepository<'a> {
    store: &'a Store,
    keys: &'a KeyManager,
    users: UserRepository<'a>,
}

impl<'a> SessionRepository<'a> {
    pub fn new(store: &'a Store, keys: &'a KeyManager, region: &'a str) -> Self {
        Self {
            store,
            keys,
            users: UserRepository::new(store, keys, region),
        }
    }

    /// Create a session for a user.
    ///
    /// `expiration` must be a valid duration string; it is clamped to
    /// `max_retention` when that is configured.
    pub fn generate(
        &self,
        user_token: &str,
        client_ip: Option<&str>,
        expiration: &str,
        max_retention: &str,
        meta: &Value,
    ) -> VaultResult<String> {
        let endtime = capped_end_time(expiration, max_retention)?;
        let plain = serde_json::to_vec(meta).map_err(|e| VaultError::Validation(e.to_string()))?;
        let encrypted = self.users.encrypt_for(user_token, &plain)?;

        let row = SessionRecord {
            session: String::new(),
            token: user_token.to_string(),
            meta: encrypted,
            endtime,
            clientipidx: client_ip
                .filter(|ip| !ip.is_empty())
                .map(|ip| self.keys.hash_index(ip)),
            created: Utc::now().timestamp(),
        };
        let session = self.store.create(row)?;
        tracing::debug!(session = %session, "Session created");
        Ok(session)
    }

    /// Owner token and decrypted metadata.
    /// Owner token and metadata of a live session. `authorize` sees the
    /// owner before expiry is checked, so callers who may not read the
    /// session never learn whether it expired.
    pub fn get<F>(&self, session: &str, authorize: F) -> VaultResult<(String, Value)>
    where
        F: FnOnce(&str) -> VaultResult<()>,
    {
        let row: SessionRecord = self
            .store
            .get(SessionRecord::KEY, session)?
            .ok_or(VaultError::NotFound)?;
        authorize(&row.token)?;
        if Utc::now().timestamp() > row.endtime {
            return Err(VaultError::SessionExpired);
        }
        let view = self.open(row.clone())?;
        Ok((row.token, view.meta))
    }

    fn open(&self, row: SessionRecord) -> VaultResult<SessionView> {
        let plain = self.users.decrypt_for(&row.token, &row.meta)?;
        let meta = serde_json::from_slice(&plain)
            .map_err(|_| VaultError::Crypto(CryptoError::Decrypt))?;
        Ok(SessionView {
            session: row.session,
            created: row.created,
            endtime: row.endtime,
            meta,
        })
    }

    /// Sessions of one user with the total count. `0, 0` lists all.
    pub fn list_for_user(
        &self,
        user_token: &str,
        offset: usize,
        limit: usize,
    ) -> VaultResult<(Vec<SessionView>, u64)> {
        let key = self.users.record_key(user_token)?;
        let total = self.store.count::<SessionRecord>("token", user_token)?;
        let rows: Vec<SessionRecord> = self.store.list("token", user_token, offset, limit)?;

        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            let meta = self
                .keys
                .decrypt(&key, &row.meta)
                .ok()
                .and_then(|plain| serde_json::from_slice(&plain).ok())
                .unwrap_or(Value::Null);
            views.push(SessionView {
                session: row.session,
                created: row.created,
                endtime: row.endtime,
                meta,
            });
        }
        Ok((views, total))
    }

    /// Remove sessions that ended before `cutoff`.
    pub fn delete_expired(&self, cutoff: i64) -> StoreResult<u64> {
        self.store.delete_expired::<SessionRecord>(cutoff)
    }
}
