// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User record endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use super::{addressed, event_for, locate, reply, Reply};
use crate::{
    auth::{decide, require_admin, Auth, AuthError, Caller, Decision, MaybeAuth},
    error::{ApiError, VaultError, VaultResult},
    state::AppState,
    storage::{
        audited,
        repository::{
            ConsentRepository, RequestAction, RequestRepository, UserAppRepository, UserRepository,
            XtokenRepository,
        },
        AuditEvent,
    },
};

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub token: String,
    pub data: Value,
}

/// Result of a forget-me or change-me call: done now, or queued for
/// approval.
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum ActionOutcome {
    Done { token: String },
    RequestCreated { token: String, rtoken: String },
}

/// Queue a data-subject request and tag the audit event with it. `app`
/// names the per-app record a change targets.
pub(crate) fn queue_request(
    state: &AppState,
    token: &str,
    action: RequestAction,
    app: Option<&str>,
    change: Option<&Value>,
    event: &mut AuditEvent,
) -> VaultResult<ActionOutcome> {
    let requests = RequestRepository::new(&state.store, &state.keys, state.region());
    let (rtoken, _) = requests.create(token, action, app, change)?;
    event.set_request(&rtoken);
    Ok(ActionOutcome::RequestCreated {
        token: token.to_string(),
        rtoken,
    })
}

/// `POST /v1/user`: create a user record.
///
/// Needs an admin token unless `generic.create_user_without_access_token`
/// is set.
pub async fn create_user(
    State(state): State<AppState>,
    MaybeAuth(caller): MaybeAuth,
    Json(profile): Json<Value>,
) -> Result<Json<Reply<TokenResponse>>, ApiError> {
    let who = caller
        .as_ref()
        .map(Caller::audit_label)
        .unwrap_or_else(|| "anonymous".to_string());
    let event = AuditEvent::new("create user record").with_who(who);

    let token = audited(&state.store, event, |ev| {
        match &caller {
            Some(caller) => require_admin(caller)?,
            None if state.config.generic.create_user_without_access_token => {}
            None => return Err(AuthError::new("user creation requires an access token").into()),
        }

        let users = UserRepository::new(&state.store, &state.keys, state.region());
        let (token, indexes) = users.create(&profile)?;
        ev.set_record(&token);

        let consent = ConsentRepository::new(&state.store, &state.keys, state.region());
        if let Err(e) = consent.link(&token, &indexes.hashed_identities()) {
            tracing::warn!(token = %token, error = %e, "Failed to link consent rows");
        }
        Ok(token)
    })?;

    state.notifier.profile_created(&token, &profile);
    Ok(reply(TokenResponse { token }))
}

/// `GET /v1/user/{mode}/{address}`
pub async fn get_user(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((mode, address)): Path<(String, String)>,
) -> Result<Json<Reply<UserResponse>>, ApiError> {
    let event = event_for("get user record", &caller);

    let response = audited(&state.store, event, |ev| {
        let (mode, address) = addressed(&state, ev, &mode, &address)?;
        let user = locate(&state, &caller, mode, &address, ev)?;
        let data = UserRepository::new(&state.store, &state.keys, state.region()).profile(&user)?;
        Ok(UserResponse {
            token: user.token,
            data,
        })
    })?;
    Ok(reply(response))
}

/// `PUT /v1/user/{mode}/{address}`: merge a patch into the profile, or
/// queue a change-me request when self-service changes are off.
pub async fn change_user(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((mode, address)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<Json<Reply<ActionOutcome>>, ApiError> {
    let event = event_for("change user record", &caller);

    let outcome = audited(&state.store, event, |ev| {
        let (mode, address) = addressed(&state, ev, &mode, &address)?;
        if !patch.is_object() {
            return Err(VaultError::Validation("user profile must be a JSON object".into()));
        }
        let user = locate(&state, &caller, mode, &address, ev)?;
        match decide(&caller, RequestAction::ChangeMe, None, &state.config.self_service) {
            Decision::QueueAsRequest => {
                queue_request(&state, &user.token, RequestAction::ChangeMe, None, Some(&patch), ev)
            }
            Decision::ExecuteDirectly => {
                apply_change(&state, &user.token, &patch)?;
                Ok(ActionOutcome::Done { token: user.token })
            }
        }
    })?;
    Ok(reply(outcome))
}

/// Apply a profile patch, relink consent and notify.
pub(crate) fn apply_change(state: &AppState, token: &str, patch: &Value) -> VaultResult<()> {
    let users = UserRepository::new(&state.store, &state.keys, state.region());
    let change = users.change(token, patch)?;

    let consent = ConsentRepository::new(&state.store, &state.keys, state.region());
    if let Err(e) = consent.link(token, &change.indexes.hashed_identities()) {
        tracing::warn!(token = %token, error = %e, "Failed to link consent rows");
    }
    state.notifier.profile_changed(token, &change.old, &change.new);
    Ok(())
}

/// Delete a user record with its app records, revoke its tokens and
/// notify. A record that is already gone is not an error.
pub(crate) fn forget_user(state: &AppState, token: &str) -> VaultResult<bool> {
    let users = UserRepository::new(&state.store, &state.keys, state.region());
    match users.delete(token)? {
        Some(last_profile) => {
            UserAppRepository::new(&state.store, &state.keys, state.region()).delete_for_user(token)?;
            XtokenRepository::new(&state.store, &state.keys).revoke_for_user(token)?;
            state.notifier.forget_me(token, &last_profile);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Forget a located record. Losing a race with a concurrent delete still
/// answers done; the audit event notes it.
fn forget_now(state: &AppState, token: String, event: &mut AuditEvent) -> VaultResult<ActionOutcome> {
    if !forget_user(state, &token)? {
        event.mark_failed("record already deleted");
    }
    Ok(ActionOutcome::Done { token })
}

/// `DELETE /v1/user/{mode}/{address}`: forget the user, or queue a
/// forget-me request.
pub async fn delete_user(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((mode, address)): Path<(String, String)>,
) -> Result<Json<Reply<ActionOutcome>>, ApiError> {
    let event = event_for("forget user record", &caller);

    let outcome = audited(&state.store, event, |ev| {
        let (mode, address) = addressed(&state, ev, &mode, &address)?;
        let user = locate(&state, &caller, mode, &address, ev)?;
        match decide(&caller, RequestAction::ForgetMe, None, &state.config.self_service) {
            Decision::QueueAsRequest => {
                queue_request(&state, &user.token, RequestAction::ForgetMe, None, None, ev)
            }
            Decision::ExecuteDirectly => forget_now(&state, user.token, ev),
        }
    })?;
    Ok(reply(outcome))
}
