// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shareable records: a time-bounded, read-only view of selected profile
//! fields, addressed by its own token.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::users::UserRepository;
use crate::crypto::KeyManager;
use crate::error::{VaultError, VaultResult};
use crate::expiration::capped_end_time;
use crate::storage::{Record, Store, Table};
use crate::validation::IndexMode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharedRecord {
    pub record: String,
    /// Source user.
    pub token: String,
    /// Top-level profile fields exposed; empty exposes the whole profile.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    pub endtime: i64,
    pub created: i64,
}

impl Record for SharedRecord {
    const TABLE: Table = Table::Sharedrecords;
    const KEY: &'static str = "record";

    fn key(&self) -> &str {
        &self.record
    }

    fn set_key(&mut self, key: String) {
        self.record = key;
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![("token", self.token.clone())]
    }
}

/// Keep only `fields` of a profile object.
pub fn select_fields(profile: &Value, fields: &[String]) -> Value {
    if fields.is_empty() {
        return profile.clone();
    }
    let Some(object) = profile.as_object() else {
        return Value::Object(Map::new());
    };
    let selected = fields
        .iter()
        .filter_map(|field| object.get(field).map(|v| (field.clone(), v.clone())))
        .collect();
    Value::Object(selected)
}

/// Parse the comma separated `fields` parameter.
pub fn parse_fields(fields: &str) -> Vec<String> {
    fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct SharedRecordRepository<'a> {
    store: &'a Store,
    users: UserRepository<'a>,
}

impl<'a> SharedRecordRepository<'a> {
    pub fn new(store: &'a Store, keys: &'a KeyManager, region: &'a str) -> Self {
        Self {
            store,
            users: UserRepository::new(store, keys, region),
        }
    }

    /// Share a view of a user's profile until `expiration` (capped by
    /// `max_retention`).
    pub fn create(
        &self,
        user_token: &str,
        fields: Vec<String>,
        app: Option<&str>,
        expiration: &str,
        max_retention: &str,
    ) -> VaultResult<String> {
        let endtime = capped_end_time(expiration, max_retention)?;
        self.users.find_by_token(user_token)?;

        let row = SharedRecord {
            record: String::new(),
            token: user_token.to_string(),
            fields,
            app: app.map(str::to_string),
            endtime,
            created: Utc::now().timestamp(),
        };
        let record = self.store.create(row)?;
        tracing::info!(record = %record, token = %user_token, "Shared record created");
        Ok(record)
    }

    /// The shared row and its selected profile fields. Expired records are
    /// not found even though the row still exists.
    pub fn get(&self, record: &str) -> VaultResult<(SharedRecord, Value)> {
        let row: SharedRecord = self
            .store
            .get(SharedRecord::KEY, record)?
            .ok_or(VaultError::NotFound)?;
        if Utc::now().timestamp() > row.endtime {
            return Err(VaultError::NotFound);
        }
        let (_, profile) = self.users.get(IndexMode::Token, &row.token)?;
        let data = select_fields(&profile, &row.fields);
        Ok((row, data))
    }
}
