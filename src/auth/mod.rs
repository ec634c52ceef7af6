// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Opaque access tokens (xtokens) for the vault API.
//!
//! ## Auth Flow
//!
//! 1. The caller sends `X-Bunker-Token: <token>`
//! 2. The server hashes the value, looks up the xtoken row and rejects
//!    unknown or expired tokens
//! 3. The row yields a [`Caller`]:
//!    - `root`, `api` → may act on any record
//!    - `app`, `login` → bound to one user record
//! 4. Handlers check the target record with [`enforce_auth`] and route
//!    data-subject actions through [`decide`]
//!
//! ## Security
//!
//! - Every denial is the same generic "access denied"
//! - Only digests of bearer values are stored
//! - Login tokens expire after one hour

pub mod claims;
pub mod error;
pub mod extractor;
pub mod login;
pub mod policy;
pub mod roles;

pub use claims::Caller;
pub use error::AuthError;
pub use extractor::{Auth, MaybeAuth, TOKEN_HEADER};
pub use policy::{decide, enforce_auth, may_change_consent, require_admin, require_root, Decision};
pub use roles::TokenType;
