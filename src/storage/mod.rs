// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent storage in a single redb file.
//!
//! ## Security Model
//!
//! - The store never sees plaintext personal data: profiles, app records,
//!   session metadata and request payloads arrive already encrypted
//! - Lookup values (login, email, phone, client IP) are stored as keyed
//!   digests only
//! - Bearer tokens are stored as digests, so a copy of the file does not
//!   grant API access
//!
//! ## Tables
//!
//! ```text
//! users          token   → wrapped key, encrypted profile, index digests
//! audit          atoken  → audit event
//! xtokens        digest  → access token role and binding
//! consent        ctoken  → brief, identity digest, status
//! sessions       session → encrypted meta, end time
//! requests       rtoken  → forget-me / change-me workflow
//! sharedrecords  record  → time-bounded field selection
//! userapps       key     → one app's encrypted data about one user
//! ```

pub mod audit;
pub mod database;
pub mod repository;
pub mod table;

pub use audit::{audited, AuditEvent, AuditRepository, AuditStatus};
pub use database::{Store, StoreError, StoreResult};
pub use table::{new_token, Record, Table};
