// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PII Vault - Encrypted Personal Data Store
//!
//! Personal records are encrypted with a per-record key and replaced by an
//! opaque token. Callers look records up by token, login, email or phone;
//! the personal values themselves are only stored as keyed digests.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Access tokens, record-level authorization and login codes
//! - `cleanup` - Periodic expiry sweep
//! - `crypto` - Master key, record keys and index digests
//! - `notify` - Outbound change notifications and code delivery
//! - `storage` - redb-backed tables and repositories

pub mod api;
pub mod auth;
pub mod cleanup;
pub mod config;
pub mod crypto;
pub mod error;
pub mod expiration;
pub mod notify;
pub mod state;
pub mod storage;
pub mod validation;
