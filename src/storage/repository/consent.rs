// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consent ledger.
//!
//! A consent row is keyed by the identity that gave it (`who`) and the
//! purpose (`brief`). Identities are user tokens or the digests of an email
//! or phone number, so consent can be recorded before a user record exists.
//! Once the user appears, [`ConsentRepository::link`] attaches the rows and
//! collapses duplicates so there is one row per (user, brief).

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::users::UserRepository;
use crate::crypto::KeyManager;
use crate::error::{VaultError, VaultResult};
use crate::storage::{Record, Store, StoreError, Table};
use crate::validation::IndexMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentStatus {
    Accept,
    Withdraw,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentRecord {
    pub ctoken: String,
    /// Linked user token, empty until a user exists for `who`.
    #[serde(default)]
    pub token: String,
    pub brief: String,
    pub mode: IndexMode,
    /// User token for `token` mode, keyed digest otherwise.
    pub who: String,
    pub status: ConsentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawn: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endtime: Option<i64>,
    pub updated: i64,
}

impl ConsentRecord {
    fn who_brief(&self) -> String {
        who_brief(&self.who, &self.brief)
    }
}

impl Record for ConsentRecord {
    const TABLE: Table = Table::Consent;
    const KEY: &'static str = "ctoken";

    fn key(&self) -> &str {
        &self.ctoken
    }

    fn set_key(&mut self, key: String) {
        self.ctoken = key;
    }

    fn index_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("token", self.token.clone()),
            ("brief", self.brief.clone()),
            ("who", self.who.clone()),
            ("whobrief", self.who_brief()),
        ]
    }
}

fn who_brief(who: &str, brief: &str) -> String {
    format!("{who}:{brief}")
}

/// Which row survives when one user holds the same brief more than once.
fn keep_rank(mode: IndexMode) -> u8 {
    match mode {
        IndexMode::Email => 0,
        IndexMode::Token => 1,
        IndexMode::Phone => 2,
        IndexMode::Login => 3,
    }
}

/// The identity a consent call is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentIdentity {
    pub mode: IndexMode,
    pub who: String,
    /// Existing user for this identity, if any.
    pub user_token: Option<String>,
}

pub struct ConsentRepository<'a> {
    store: &'a Store,
    keys: &'a KeyManager,
    users: UserRepository<'a>,
}

impl<'a> ConsentRepository<'a> {
    pub fn new(store: &'a Store, keys: &'a KeyManager, region: &'a str) -> Self {
        Self {
            store,
            keys,
            users: UserRepository::new(store, keys, region),
        }
    }

    /// Resolve a normalized address into a consent identity.
    ///
    /// Token identities must name an existing user. Login is not a consent
    /// identity.
    pub fn identity(&self, mode: IndexMode, address: &str) -> VaultResult<ConsentIdentity> {
        match mode {
            IndexMode::Token => {
                let user = self.users.find_by_token(address)?;
                Ok(ConsentIdentity {
                    mode,
                    who: user.token.clone(),
                    user_token: Some(user.token),
                })
            }
            IndexMode::Email | IndexMode::Phone => Ok(ConsentIdentity {
                mode,
                who: self.keys.hash_index(address),
                user_token: self.users.find(mode, address)?.map(|u| u.token),
            }),
            IndexMode::Login => Err(VaultError::Validation("bad index".to_string())),
        }
    }

    /// Existing row for the identity and brief: by `who` first, then through
    /// the linked user.
    fn find(&self, identity: &ConsentIdentity, brief: &str) -> VaultResult<Option<ConsentRecord>> {
        if let Some(row) = self
            .store
            .get::<ConsentRecord>("whobrief", &who_brief(&identity.who, brief))?
        {
            return Ok(Some(row));
        }
        match &identity.user_token {
            Some(token) => self.get_for_user(token, brief),
            None => Ok(None),
        }
    }

    /// Record or refresh an accepted consent.
    pub fn accept(
        &self,
        identity: &ConsentIdentity,
        brief: &str,
        message: Option<&str>,
        endtime: Option<i64>,
    ) -> VaultResult<ConsentRecord> {
        let now = Utc::now().timestamp();
        let refresh = |row: &mut ConsentRecord| -> VaultResult<()> {
            row.status = ConsentStatus::Accept;
            row.message = message.map(str::to_string);
            row.accepted = Some(now);
            row.withdrawn = None;
            row.endtime = endtime;
            row.updated = now;
            if row.token.is_empty() {
                if let Some(token) = &identity.user_token {
                    row.token = token.clone();
                }
            }
            Ok(())
        };

        if let Some(existing) = self.find(identity, brief)? {
            return self
                .store
                .update(&existing.ctoken, &[], refresh)?
                .ok_or(VaultError::NotFound);
        }

        let row = ConsentRecord {
            ctoken: String::new(),
            token: identity.user_token.clone().unwrap_or_default(),
            brief: brief.to_string(),
            mode: identity.mode,
            who: identity.who.clone(),
            status: ConsentStatus::Accept,
            message: message.map(str::to_string),
            accepted: Some(now),
            withdrawn: None,
            endtime,
            updated: now,
        };
        match self.store.create_unique(row.clone(), &["whobrief"]) {
            Ok(ctoken) => {
                tracing::debug!(ctoken = %ctoken, brief = %brief, "Consent recorded");
                Ok(ConsentRecord { ctoken, ..row })
            }
            // Lost a race with a concurrent accept: refresh the winner.
            Err(StoreError::Duplicate(_)) => {
                let winner = self.find(identity, brief)?.ok_or(VaultError::NotFound)?;
                self.store
                    .update(&winner.ctoken, &[], refresh)?
                    .ok_or(VaultError::NotFound)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Withdraw consent. `None` when no row exists for the identity and
    /// brief.
    pub fn withdraw(
        &self,
        identity: &ConsentIdentity,
        brief: &str,
    ) -> VaultResult<Option<ConsentRecord>> {
        let Some(existing) = self.find(identity, brief)? else {
            return Ok(None);
        };
        let now = Utc::now().timestamp();
        let updated = self
            .store
            .update::<ConsentRecord, _, VaultError>(&existing.ctoken, &[], |row| {
                row.status = ConsentStatus::Withdraw;
                row.withdrawn = Some(now);
                row.updated = now;
                Ok(())
            })?;
        Ok(updated)
    }

    pub fn list_for_user(&self, user_token: &str) -> VaultResult<Vec<ConsentRecord>> {
        Ok(self.store.list("token", user_token, 0, 0)?)
    }

    /// Rows for an identity that has no user yet.
    pub fn list_by_who(&self, who: &str) -> VaultResult<Vec<ConsentRecord>> {
        Ok(self.store.list("who", who, 0, 0)?)
    }

    /// All consent rows of an identity: linked rows when a user exists,
    /// rows by identity otherwise.
    pub fn list_for_identity(&self, identity: &ConsentIdentity) -> VaultResult<Vec<ConsentRecord>> {
        match &identity.user_token {
            Some(token) => self.list_for_user(token),
            None => self.list_by_who(&identity.who),
        }
    }

    pub fn get_for_user(&self, user_token: &str, brief: &str) -> VaultResult<Option<ConsentRecord>> {
        let rows: Vec<ConsentRecord> = self.store.list("token", user_token, 0, 0)?;
        Ok(rows.into_iter().find(|row| row.brief == brief))
    }

    pub fn list_by_brief(&self, brief: &str) -> VaultResult<Vec<ConsentRecord>> {
        Ok(self.store.list("brief", brief, 0, 0)?)
    }

    /// Distinct brief names, sorted.
    pub fn list_briefs(&self) -> VaultResult<Vec<String>> {
        let briefs: BTreeSet<String> = self
            .store
            .scan::<ConsentRecord>()?
            .into_iter()
            .map(|row| row.brief)
            .collect();
        Ok(briefs.into_iter().collect())
    }

    /// Attach unlinked rows given through `identities` to `user_token`, then
    /// keep one row per brief (email over token over phone).
    ///
    /// Returns the number of rows linked.
    pub fn link(&self, user_token: &str, identities: &[(IndexMode, String)]) -> VaultResult<usize> {
        let mut linked = 0;
        for (_, who) in identities {
            let rows: Vec<ConsentRecord> = self.store.list("who", who, 0, 0)?;
            for row in rows.into_iter().filter(|row| row.token.is_empty()) {
                let updated = self
                    .store
                    .update::<ConsentRecord, _, VaultError>(&row.ctoken, &[], |row| {
                        if row.token.is_empty() {
                            row.token = user_token.to_string();
                        }
                        Ok(())
                    })?;
                if updated.is_some_and(|row| row.token == user_token) {
                    linked += 1;
                }
            }
        }
        self.dedup(user_token)?;
        if linked > 0 {
            tracing::info!(token = %user_token, linked, "Consent rows linked");
        }
        Ok(linked)
    }

    fn dedup(&self, user_token: &str) -> VaultResult<()> {
        let mut by_brief: HashMap<String, Vec<ConsentRecord>> = HashMap::new();
        for row in self.list_for_user(user_token)? {
            by_brief.entry(row.brief.clone()).or_default().push(row);
        }
        for (_, mut rows) in by_brief {
            if rows.len() < 2 {
                continue;
            }
            rows.sort_by_key(|row| keep_rank(row.mode));
            for duplicate in rows.into_iter().skip(1) {
                self.store
                    .delete::<ConsentRecord>(ConsentRecord::KEY, &duplicate.ctoken)?;
            }
        }
        Ok(())
    }

    /// Move accepted rows whose end time has passed to `expired`. Returns
    /// the rows that changed.
    pub fn expire(&self, now: i64) -> VaultResult<Vec<ConsentRecord>> {
        let mut changed = Vec::new();
        for row in self.store.scan::<ConsentRecord>()? {
            let due = row.status == ConsentStatus::Accept
                && row.endtime.is_some_and(|end| end < now);
            if !due {
                continue;
            }
            let mut moved = false;
            let updated = self
                .store
                .update::<ConsentRecord, _, VaultError>(&row.ctoken, &[], |row| {
                    if row.status == ConsentStatus::Accept
                        && row.endtime.is_some_and(|end| end < now)
                    {
                        row.status = ConsentStatus::Expired;
                        row.updated = now;
                        moved = true;
                    }
                    Ok(())
                })?;
            if let (true, Some(row)) = (moved, updated) {
                changed.push(row);
            }
        }
        Ok(changed)
    }
}
