// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Record-level authorization and the self-service policy.
//!
//! Handlers never branch on roles themselves; they ask here.

use super::{AuthError, Caller, TokenType};
use crate::config::SelfServiceConfig;
use crate::storage::repository::RequestAction;
use crate::validation::matches_any;

/// What to do with a data-subject action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    ExecuteDirectly,
    QueueAsRequest,
}

/// Allow the caller to act on the record `target`.
///
/// Root and api tokens pass for any record. App and login tokens pass only
/// for the user they are bound to.
pub fn enforce_auth(caller: &Caller, target: &str) -> Result<(), AuthError> {
    if caller.is_admin() {
        return Ok(());
    }
    match caller.user_token.as_deref() {
        Some(bound) if bound == target => Ok(()),
        Some(_) => Err(AuthError::new(format!(
            "{} token is bound to another record",
            caller.token_type
        ))),
        None => Err(AuthError::new("token is not bound to a record")),
    }
}

/// Root or api only.
pub fn require_admin(caller: &Caller) -> Result<(), AuthError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(AuthError::new(format!(
            "{} token used for an admin operation",
            caller.token_type
        )))
    }
}

pub fn require_root(caller: &Caller) -> Result<(), AuthError> {
    if caller.token_type == TokenType::Root {
        Ok(())
    } else {
        Err(AuthError::new(format!(
            "{} token used for a root operation",
            caller.token_type
        )))
    }
}

/// Decide whether a forget-me or change-me runs now or waits for approval.
///
/// `app` names the app section being changed; `None` means the profile.
pub fn decide(
    caller: &Caller,
    action: RequestAction,
    app: Option<&str>,
    policy: &SelfServiceConfig,
) -> Decision {
    if caller.is_admin() {
        return Decision::ExecuteDirectly;
    }
    let allowed = match action {
        RequestAction::ForgetMe => policy.forget_me,
        RequestAction::ChangeMe => match app {
            Some(app) => matches_any(&policy.app_record_change, app),
            None => policy.user_record_change,
        },
    };
    if allowed {
        Decision::ExecuteDirectly
    } else {
        Decision::QueueAsRequest
    }
}

/// Whether a non-admin caller may withdraw consent for `brief` themselves.
pub fn may_change_consent(caller: &Caller, brief: &str, policy: &SelfServiceConfig) -> bool {
    caller.is_admin() || matches_any(&policy.consent_change, brief)
}
