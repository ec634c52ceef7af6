// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Passwordless login: a one-time code sent to the user's email or phone is
//! exchanged for a short-lived `login` token.

use chrono::Utc;

use super::AuthError;
use crate::error::{VaultError, VaultResult};
use crate::state::AppState;
use crate::storage::repository::{UserRepository, XtokenRepository};
use crate::validation::{normalize_address, IndexMode};

/// Digits in a login code.
pub const LOGIN_CODE_DIGITS: u32 = 6;

/// Seconds a login code stays valid.
pub const LOGIN_CODE_TTL: i64 = 600;

/// Code accepted for the configured demo identity in `dev` builds.
#[cfg(feature = "dev")]
const DEMO_CODE: &str = "444444";

fn login_mode(mode: IndexMode) -> VaultResult<IndexMode> {
    match mode {
        IndexMode::Email | IndexMode::Phone => Ok(mode),
        _ => Err(VaultError::Validation("bad index".to_string())),
    }
}

/// Send a login code to the address if a user owns it.
///
/// Returns the user token for auditing; callers must answer the same way
/// whether or not a user was found.
pub fn request_login_code(
    state: &AppState,
    mode: IndexMode,
    address: &str,
) -> VaultResult<Option<String>> {
    let mode = login_mode(mode)?;
    let address = normalize_address(mode, address, state.region())?;
    let users = UserRepository::new(&state.store, &state.keys, state.region());

    let Some(user) = users.find(mode, &address)? else {
        tracing::debug!(%mode, "Login code requested for unknown address");
        return Ok(None);
    };

    let code = state.keys.random_code(LOGIN_CODE_DIGITS)?;
    users.set_tempcode(&user.token, &code, Utc::now().timestamp() + LOGIN_CODE_TTL)?;
    match mode {
        IndexMode::Email => state.sender.send_email_code(&address, &code),
        _ => state.sender.send_sms_code(&address, &code),
    }
    tracing::info!(token = %user.token, %mode, "Login code issued");
    Ok(Some(user.token))
}

#[cfg(feature = "dev")]
fn is_demo_login(state: &AppState, mode: IndexMode, address: &str, code: &str) -> bool {
    let demo = &state.config.generic.demo_identity;
    if demo.is_empty() || code != DEMO_CODE {
        return false;
    }
    normalize_address(mode, demo, state.region()).is_ok_and(|demo| demo == address)
}

#[cfg(not(feature = "dev"))]
fn is_demo_login(_state: &AppState, _mode: IndexMode, _address: &str, _code: &str) -> bool {
    false
}

/// Exchange a login code for a `login` token. Returns the bearer value and
/// the user token.
///
/// Unknown address, wrong code and expired code are the same error.
pub fn verify_login_code(
    state: &AppState,
    mode: IndexMode,
    address: &str,
    code: &str,
) -> VaultResult<(String, String)> {
    let mode = login_mode(mode)?;
    let address = normalize_address(mode, address, state.region())?;
    let users = UserRepository::new(&state.store, &state.keys, state.region());

    let user = users
        .find(mode, &address)?
        .ok_or_else(|| AuthError::new("login code for unknown address"))?;

    if is_demo_login(state, mode, &address, code) {
        tracing::warn!(token = %user.token, "Demo login code accepted");
    } else {
        users.consume_tempcode(&user.token, code.trim())?;
    }

    let xtoken = XtokenRepository::new(&state.store, &state.keys).create_login(&user.token)?;
    tracing::info!(token = %user.token, "Login code verified");
    Ok((xtoken, user.token))
}
