// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the record store.
//!
//! Each repository owns one table and borrows the [`Store`] and the
//! [`KeyManager`]; repositories that handle personal data encrypt it with
//! the owning user's record key before it reaches the store.
//!
//! [`Store`]: crate::storage::Store
//! [`KeyManager`]: crate::crypto::KeyManager

pub mod consent;
pub mod requests;
pub mod sessions;
pub mod shared;
pub mod userapps;
pub mod users;
pub mod xtokens;

pub use consent::{ConsentIdentity, ConsentRecord, ConsentRepository, ConsentStatus};
pub use requests::{RequestAction, RequestDetail, RequestRecord, RequestRepository, RequestStatus};
pub use sessions::{SessionRecord, SessionRepository, SessionView};
pub use shared::{parse_fields, select_fields, SharedRecord, SharedRecordRepository};
pub use userapps::{UserAppRecord, UserAppRepository};
pub use users::{merge_patch, ProfileChange, ProfileIndexes, UserRecord, UserRepository};
pub use xtokens::{XtokenRecord, XtokenRepository, LOGIN_TOKEN_TTL};
