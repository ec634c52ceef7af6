// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Every record read or change, login attempt and request decision is
//! written to the append-only audit table, whether or not the operation
//! succeeded.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::table::{Record, Table};
use super::{Store, StoreResult};
use crate::crypto::KeyManager;
use crate::error::VaultResult;
use crate::validation::IndexMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Ok,
    Failed,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEvent {
    pub atoken: String,
    /// Short description, e.g. "get user record by email".
    pub title: String,
    pub status: AuditStatus,
    /// Failure detail. Internal only, never returned by the HTTP layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    /// User token the event is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    /// Request token, for workflow events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<IndexMode>,
    /// Address used for the lookup; hashed for email, phone and login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Acting role and name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub who: Option<String>,
    pub when: i64,
}

impl Record for AuditEvent {
    const TABLE: Table = Table::Audit;
    const KEY: &'static str = "atoken";

    fn key(&self) -> &str {
        &self.atoken
    }

    fn set_key(&mut self, key: String) {
        self.atoken = key;
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        if let Some(record) = &self.record {
            entries.push(("record", record.clone()));
        }
        if let Some(request) = &self.request {
            entries.push(("request", request.clone()));
        }
        entries
    }

    /// Audit rows age out by event time.
    fn expires_at(&self) -> Option<i64> {
        Some(self.when)
    }
}

impl AuditEvent {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            atoken: String::new(),
            title: title.into(),
            status: AuditStatus::Ok,
            msg: None,
            record: None,
            request: None,
            mode: None,
            address: None,
            who: None,
            when: Utc::now().timestamp(),
        }
    }

    pub fn with_record(mut self, token: impl Into<String>) -> Self {
        self.record = Some(token.into());
        self
    }

    pub fn with_request(mut self, rtoken: impl Into<String>) -> Self {
        self.request = Some(rtoken.into());
        self
    }

    /// Record how the subject was addressed. Personal values are hashed;
    /// tokens are kept as is and also link the event to the record.
    pub fn with_address(mut self, keys: &KeyManager, mode: IndexMode, address: &str) -> Self {
        self.set_address(keys, mode, address);
        self
    }

    pub fn with_who(mut self, who: impl Into<String>) -> Self {
        self.who = Some(who.into());
        self
    }

    pub fn set_record(&mut self, token: &str) {
        self.record = Some(token.to_string());
    }

    pub fn set_address(&mut self, keys: &KeyManager, mode: IndexMode, address: &str) {
        self.mode = Some(mode);
        if mode.is_pii() {
            self.address = Some(keys.hash_index(address));
        } else {
            self.address = Some(address.to_string());
            self.record.get_or_insert_with(|| address.to_string());
        }
    }

    pub fn set_request(&mut self, rtoken: &str) {
        self.request = Some(rtoken.to_string());
    }

    pub fn mark_failed(&mut self, msg: impl Into<String>) {
        self.status = AuditStatus::Failed;
        self.msg = Some(msg.into());
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    store: &'a Store,
}

impl<'a> AuditRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn log(&self, event: AuditEvent) -> StoreResult<String> {
        self.store.create(event)
    }

    pub fn get(&self, atoken: &str) -> StoreResult<Option<AuditEvent>> {
        self.store.get(AuditEvent::KEY, atoken)
    }

    /// Events about one user record, oldest first, with the total count.
    pub fn list_by_record(
        &self,
        token: &str,
        offset: usize,
        limit: usize,
    ) -> StoreResult<(Vec<AuditEvent>, u64)> {
        let total = self.store.count::<AuditEvent>("record", token)?;
        let events = self.store.list("record", token, offset, limit)?;
        Ok((events, total))
    }

    /// Retention sweep: drop events older than `cutoff`.
    pub fn delete_older_than(&self, cutoff: i64) -> StoreResult<u64> {
        self.store.delete_expired::<AuditEvent>(cutoff)
    }
}

/// Run `op` inside an audit scope.
///
/// The event is always written. If `op` fails the event is marked failed
/// with the internal error message. A failure to write the event itself is
/// logged but never replaces the operation's own result.
pub fn audited<T, F>(store: &Store, mut event: AuditEvent, op: F) -> VaultResult<T>
where
    F: FnOnce(&mut AuditEvent) -> VaultResult<T>,
{
    let result = op(&mut event);
    if let Err(err) = &result {
        event.mark_failed(err.to_string());
    }

    let title = event.title.clone();
    if let Err(err) = AuditRepository::new(store).log(event) {
        tracing::error!(error = %err, title = %title, "Failed to write audit event");
    }
    result
}
