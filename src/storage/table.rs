// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Table identity and the typed row contract.

use serde::{de::DeserializeOwned, Serialize};

/// The logical tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Audit,
    Xtokens,
    Consent,
    Sessions,
    Requests,
    Sharedrecords,
    Userapps,
}

impl Table {
    pub const ALL: [Table; 8] = [
        Table::Users,
        Table::Audit,
        Table::Xtokens,
        Table::Consent,
        Table::Sessions,
        Table::Requests,
        Table::Sharedrecords,
        Table::Userapps,
    ];

    /// Name of the primary redb table (key → row).
    pub fn rows_name(self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Audit => "audit",
            Table::Xtokens => "xtokens",
            Table::Consent => "consent",
            Table::Sessions => "sessions",
            Table::Requests => "requests",
            Table::Sharedrecords => "sharedrecords",
            Table::Userapps => "userapps",
        }
    }

    /// Name of the secondary index redb table.
    pub fn index_name(self) -> &'static str {
        match self {
            Table::Users => "users_idx",
            Table::Audit => "audit_idx",
            Table::Xtokens => "xtokens_idx",
            Table::Consent => "consent_idx",
            Table::Sessions => "sessions_idx",
            Table::Requests => "requests_idx",
            Table::Sharedrecords => "sharedrecords_idx",
            Table::Userapps => "userapps_idx",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rows_name())
    }
}

/// A typed row stored in one [`Table`].
///
/// Rows are decoded once at the store boundary; a row that does not match
/// its struct is a decode error, never a panic.
pub trait Record: Serialize + DeserializeOwned {
    /// Table holding rows of this type.
    const TABLE: Table;

    /// Field name of the primary token (e.g. `"token"`, `"session"`).
    const KEY: &'static str;

    /// Primary token. Empty means "not assigned yet".
    fn key(&self) -> &str;

    fn set_key(&mut self, key: String);

    /// Secondary index entries `(field, value)` for this row. Empty values
    /// are skipped by the store.
    fn index_entries(&self) -> Vec<(&'static str, String)>;

    /// Unix timestamp after which [`Store::delete_expired`] may remove the row.
    ///
    /// [`Store::delete_expired`]: super::Store::delete_expired
    fn expires_at(&self) -> Option<i64> {
        None
    }
}

/// Generate a fresh random 128-bit token in canonical UUID form.
pub fn new_token() -> String {
    uuid::Uuid::new_v4().to_string()
}
