// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Data-subject requests (forget-me, change-me).
//!
//! ## Lifecycle
//!
//! ```text
//! open ──approve──▶ approve
//!   └───cancel───▶ cancel
//! ```
//!
//! Both end states are final. Every transition is a read-modify-write on
//! the stored row, so two concurrent approvals cannot both succeed.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::userapps::UserAppRepository;
use super::users::UserRepository;
use crate::crypto::{CryptoError, KeyManager};
use crate::error::{VaultError, VaultResult};
use crate::storage::{Record, Store, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestAction {
    #[serde(rename = "forget-me")]
    ForgetMe,
    #[serde(rename = "change-me")]
    ChangeMe,
}

impl RequestAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestAction::ForgetMe => "forget-me",
            RequestAction::ChangeMe => "change-me",
        }
    }
}

impl std::fmt::Display for RequestAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Open,
    Approve,
    Cancel,
}

impl RequestStatus {
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "open" => Some(RequestStatus::Open),
            "approve" => Some(RequestStatus::Approve),
            "cancel" => Some(RequestStatus::Cancel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Open => "open",
            RequestStatus::Approve => "approve",
            RequestStatus::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestRecord {
    pub rtoken: String,
    pub action: RequestAction,
    /// Subject user.
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// Requested change, encrypted with the subject's record key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
    pub status: RequestStatus,
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<i64>,
}

impl Record for RequestRecord {
    const TABLE: Table = Table::Requests;
    const KEY: &'static str = "rtoken";

    fn key(&self) -> &str {
        &self.rtoken
    }

    fn set_key(&mut self, key: String) {
        self.rtoken = key;
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("token", self.token.clone()),
            ("status", self.status.as_str().to_string()),
        ]
    }
}

/// Request together with the current data it targets (the profile, or the
/// app record when the request names an app) and the decrypted change
/// payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: RequestRecord,
    pub original: Option<Value>,
    #[serde(rename = "change")]
    pub change_data: Option<Value>,
}

pub struct RequestRepository<'a> {
    store: &'a Store,
    users: UserRepository<'a>,
    apps: UserAppRepository<'a>,
}

impl<'a> RequestRepository<'a> {
    pub fn new(store: &'a Store, keys: &'a KeyManager, region: &'a str) -> Self {
        Self {
            store,
            users: UserRepository::new(store, keys, region),
            apps: UserAppRepository::new(store, keys, region),
        }
    }

    /// Queue a request. Returns the request token and whether a new row was
    /// created; an open forget-me for the same user is reused.
    pub fn create(
        &self,
        user_token: &str,
        action: RequestAction,
        app: Option<&str>,
        change: Option<&Value>,
    ) -> VaultResult<(String, bool)> {
        if action == RequestAction::ForgetMe {
            let open: Vec<RequestRecord> = self.store.list("token", user_token, 0, 0)?;
            if let Some(existing) = open
                .into_iter()
                .find(|r| r.action == RequestAction::ForgetMe && r.status == RequestStatus::Open)
            {
                return Ok((existing.rtoken, false));
            }
        }

        let change = match change {
            Some(value) => {
                let plain =
                    serde_json::to_vec(value).map_err(|e| VaultError::Validation(e.to_string()))?;
                Some(self.users.encrypt_for(user_token, &plain)?)
            }
            None => {
                // The subject must exist even without a payload.
                self.users.find_by_token(user_token)?;
                None
            }
        };

        let row = RequestRecord {
            rtoken: String::new(),
            action,
            token: user_token.to_string(),
            app: app.map(str::to_string),
            change,
            status: RequestStatus::Open,
            created: Utc::now().timestamp(),
            resolved: None,
        };
        let rtoken = self.store.create(row)?;
        tracing::info!(rtoken = %rtoken, action = %action, "Request queued");
        Ok((rtoken, true))
    }

    pub fn get(&self, rtoken: &str) -> VaultResult<RequestRecord> {
        self.store
            .get(RequestRecord::KEY, rtoken)?
            .ok_or(VaultError::NotFound)
    }

    /// Admin queue by status, with the total count.
    pub fn list(
        &self,
        status: RequestStatus,
        offset: usize,
        limit: usize,
    ) -> VaultResult<(Vec<RequestRecord>, u64)> {
        let total = self.store.count::<RequestRecord>("status", status.as_str())?;
        let rows = self.store.list("status", status.as_str(), offset, limit)?;
        Ok((rows, total))
    }

    /// Decrypted change payload of a request, if any.
    pub fn change_payload(&self, request: &RequestRecord) -> VaultResult<Option<Value>> {
        let Some(blob) = &request.change else {
            return Ok(None);
        };
        let plain = self.users.decrypt_for(&request.token, blob)?;
        let value = serde_json::from_slice(&plain).map_err(|_| CryptoError::Decrypt)?;
        Ok(Some(value))
    }

    /// Request, current data and change payload. The original is `None`
    /// once the subject or its app record is gone.
    pub fn detail(&self, rtoken: &str) -> VaultResult<RequestDetail> {
        let request = self.get(rtoken)?;
        let current = match &request.app {
            Some(app) => self.apps.get(&request.token, app),
            None => self
                .users
                .find_by_token(&request.token)
                .and_then(|record| self.users.profile(&record)),
        };
        let original = match current {
            Ok(value) => Some(value),
            Err(VaultError::NotFound) => None,
            Err(err) => return Err(err),
        };
        let change_data = match self.change_payload(&request) {
            Ok(change) => change,
            Err(VaultError::NotFound) => None,
            Err(err) => return Err(err),
        };
        // The ciphertext is replaced by its plaintext under the same key.
        let request = RequestRecord {
            change: None,
            ..request
        };
        Ok(RequestDetail {
            request,
            original,
            change_data,
        })
    }

    /// Move a request out of `open`. Anything else is `InvalidState`.
    fn transition(
        &self,
        rtoken: &str,
        from: RequestStatus,
        to: RequestStatus,
    ) -> VaultResult<RequestRecord> {
        self.store
            .update::<RequestRecord, _, VaultError>(rtoken, &[], |row| {
                if row.status != from {
                    return Err(VaultError::InvalidState("wrong status".to_string()));
                }
                row.status = to;
                row.resolved = (to != RequestStatus::Open).then(|| Utc::now().timestamp());
                Ok(())
            })?
            .ok_or(VaultError::NotFound)
    }

    /// Approve an open request and carry it out with `execute`.
    ///
    /// The `open → approve` claim happens first, so a second approval fails
    /// with `InvalidState` even while the first one is still executing. If
    /// `execute` fails the claim is rolled back to `open`.
    pub fn approve<F>(&self, rtoken: &str, execute: F) -> VaultResult<RequestRecord>
    where
        F: FnOnce(&RequestRecord) -> VaultResult<()>,
    {
        let claimed = self.transition(rtoken, RequestStatus::Open, RequestStatus::Approve)?;
        if let Err(err) = execute(&claimed) {
            tracing::warn!(rtoken = %rtoken, error = %err, "Request action failed, reopening");
            if let Err(rollback) =
                self.transition(rtoken, RequestStatus::Approve, RequestStatus::Open)
            {
                tracing::error!(rtoken = %rtoken, error = %rollback, "Failed to reopen request");
            }
            return Err(err);
        }
        Ok(claimed)
    }

    /// Cancel an open request. The stored status is checked inside the
    /// update, so a request approved concurrently cannot be cancelled.
    pub fn cancel(&self, rtoken: &str) -> VaultResult<RequestRecord> {
        self.transition(rtoken, RequestStatus::Open, RequestStatus::Cancel)
    }
}
