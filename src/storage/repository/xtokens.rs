// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access tokens (xtokens).
//!
//! The bearer value is handed out once and only its digest is stored, so
//! the row key cannot be replayed as a credential.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, Caller, TokenType};
use crate::crypto::KeyManager;
use crate::error::VaultResult;
use crate::storage::{new_token, Record, Store, StoreResult, Table};

/// Lifetime of a login token in seconds.
pub const LOGIN_TOKEN_TTL: i64 = 3_600;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct XtokenRecord {
    /// Digest of the bearer value.
    pub xtoken: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Bound user record (`app`, `login`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endtime: Option<i64>,
}

impl Record for XtokenRecord {
    const TABLE: Table = Table::Xtokens;
    const KEY: &'static str = "xtoken";

    fn key(&self) -> &str {
        &self.xtoken
    }

    fn set_key(&mut self, key: String) {
        self.xtoken = key;
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![("type", self.token_type.as_str().to_string())];
        if let Some(token) = &self.token {
            entries.push(("token", token.clone()));
        }
        entries
    }

    fn expires_at(&self) -> Option<i64> {
        self.endtime
    }
}

pub struct XtokenRepository<'a> {
    store: &'a Store,
    keys: &'a KeyManager,
}

impl<'a> XtokenRepository<'a> {
    pub fn new(store: &'a Store, keys: &'a KeyManager) -> Self {
        Self { store, keys }
    }

    /// Persist a token row and return the bearer value.
    fn issue(
        &self,
        token_type: TokenType,
        user: Option<&str>,
        app: Option<&str>,
        name: Option<&str>,
        endtime: Option<i64>,
    ) -> VaultResult<String> {
        let bearer = new_token();
        let row = XtokenRecord {
            xtoken: self.keys.hash_index(&bearer),
            token_type,
            token: user.map(str::to_string),
            app: app.map(str::to_string),
            name: name.map(str::to_string),
            created: Utc::now().timestamp(),
            endtime,
        };
        self.store.create(row)?;
        tracing::info!(token_type = %token_type, "Access token issued");
        Ok(bearer)
    }

    /// The root token, created once at init.
    pub fn create_root(&self) -> VaultResult<String> {
        self.issue(TokenType::Root, None, None, Some("root"), None)
    }

    pub fn create_api(&self, name: &str) -> VaultResult<String> {
        self.issue(TokenType::Api, None, None, Some(name), None)
    }

    /// Token for one app acting on one user's record.
    pub fn create_app(&self, user_token: &str, app: &str) -> VaultResult<String> {
        self.issue(TokenType::App, Some(user_token), Some(app), None, None)
    }

    /// Short-lived token issued after a verified login code.
    pub fn create_login(&self, user_token: &str) -> VaultResult<String> {
        let endtime = Utc::now().timestamp() + LOGIN_TOKEN_TTL;
        self.issue(TokenType::Login, Some(user_token), None, None, Some(endtime))
    }

    /// Classify a bearer value. Unknown and expired tokens are denied alike;
    /// a failing store is an internal error, not a denial.
    pub fn resolve(&self, bearer: &str) -> VaultResult<Caller> {
        let bearer = bearer.trim();
        if bearer.is_empty() {
            return Err(AuthError::new("missing access token").into());
        }
        let row: XtokenRecord = self
            .store
            .get(XtokenRecord::KEY, &self.keys.hash_index(bearer))?
            .ok_or_else(|| AuthError::new("unknown access token"))?;

        if row.endtime.is_some_and(|end| Utc::now().timestamp() > end) {
            return Err(AuthError::new(format!("{} token expired", row.token_type)).into());
        }
        Ok(Caller {
            token_type: row.token_type,
            user_token: row.token,
            app: row.app,
            name: row.name,
        })
    }

    /// Remove login tokens past their end time.
    pub fn delete_expired(&self, now: i64) -> StoreResult<u64> {
        self.store.delete_expired::<XtokenRecord>(now)
    }

    /// Drop every app and login token bound to a user.
    pub fn revoke_for_user(&self, user_token: &str) -> StoreResult<bool> {
        let revoked = self.store.delete::<XtokenRecord>("token", user_token)?;
        if revoked {
            tracing::info!(token = %user_token, "Access tokens revoked");
        }
        Ok(revoked)
    }
}
