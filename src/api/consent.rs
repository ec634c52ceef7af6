// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consent endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{addressed, event_for, reply, Reply};
use crate::{
    auth::{enforce_auth, may_change_consent, require_admin, Auth, AuthError, Caller},
    error::{ApiError, VaultError, VaultResult},
    expiration::end_time,
    state::AppState,
    storage::{
        audited,
        repository::{ConsentIdentity, ConsentRecord, ConsentRepository},
        AuditEvent,
    },
    validation::{normalize_brief, IndexMode},
};

#[derive(Debug, Default, Deserialize)]
pub struct ConsentBody {
    pub message: Option<String>,
    /// Optional lifetime, e.g. `"90d"`.
    pub expiration: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConsentResponse {
    pub ctoken: String,
    pub brief: String,
}

#[derive(Debug, Serialize)]
pub struct WithdrawResponse {
    pub brief: String,
    pub withdrawn: bool,
}

#[derive(Debug, Serialize)]
pub struct ConsentListResponse {
    pub total: usize,
    pub rows: Vec<ConsentRecord>,
}

#[derive(Debug, Serialize)]
pub struct BriefListResponse {
    pub total: usize,
    pub briefs: Vec<String>,
}

fn repository(state: &AppState) -> ConsentRepository<'_> {
    ConsentRepository::new(&state.store, &state.keys, state.region())
}

fn brief(raw: &str) -> VaultResult<String> {
    normalize_brief(raw).ok_or_else(|| VaultError::Validation("bad brief".to_string()))
}

/// Resolve the identity and check the caller may act for it: the linked
/// user's own token, or an admin when no user exists yet.
fn authorized_identity(
    state: &AppState,
    caller: &Caller,
    mode: IndexMode,
    address: &str,
    event: &mut AuditEvent,
) -> VaultResult<ConsentIdentity> {
    let identity = match repository(state).identity(mode, address) {
        Ok(identity) => identity,
        Err(VaultError::NotFound) if !caller.is_admin() => {
            return Err(AuthError::new("consent target does not exist").into());
        }
        Err(err) => return Err(err),
    };
    match &identity.user_token {
        Some(token) => {
            event.set_record(token);
            enforce_auth(caller, token)?;
        }
        None => require_admin(caller)?,
    }
    Ok(identity)
}

fn notify(state: &AppState, row: &ConsentRecord) {
    match serde_json::to_value(row) {
        Ok(data) => state.notifier.consent_changed(&row.token, data),
        Err(e) => tracing::warn!(error = %e, "Failed to encode consent notification"),
    }
}

/// `POST /v1/consent/{mode}/{address}/{brief}`
pub async fn accept_consent(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((mode, address, brief_name)): Path<(String, String, String)>,
    body: Option<Json<ConsentBody>>,
) -> Result<Json<Reply<ConsentResponse>>, ApiError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let event = event_for("consent accept", &caller);

    let row = audited(&state.store, event, |ev| {
        let (mode, address) = addressed(&state, ev, &mode, &address)?;
        let brief = brief(&brief_name)?;
        let identity = authorized_identity(&state, &caller, mode, &address, ev)?;
        let endtime = body.expiration.as_deref().map(end_time).transpose()?;
        repository(&state).accept(&identity, &brief, body.message.as_deref(), endtime)
    })?;

    notify(&state, &row);
    Ok(reply(ConsentResponse {
        ctoken: row.ctoken,
        brief: row.brief,
    }))
}

/// `DELETE /v1/consent/{mode}/{address}/{brief}`
///
/// Non-admin callers may withdraw only briefs listed in
/// `self_service.consent_change`.
pub async fn withdraw_consent(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((mode, address, brief_name)): Path<(String, String, String)>,
) -> Result<Json<Reply<WithdrawResponse>>, ApiError> {
    let event = event_for("consent withdraw", &caller);

    let (brief, row) = audited(&state.store, event, |ev| {
        let (mode, address) = addressed(&state, ev, &mode, &address)?;
        let brief = brief(&brief_name)?;
        let identity = authorized_identity(&state, &caller, mode, &address, ev)?;
        if !may_change_consent(&caller, &brief, &state.config.self_service) {
            return Err(AuthError::new(format!("self-service withdrawal of {brief} is disabled")).into());
        }
        let row = repository(&state).withdraw(&identity, &brief)?;
        Ok((brief, row))
    })?;

    if let Some(row) = &row {
        notify(&state, row);
    }
    Ok(reply(WithdrawResponse {
        brief,
        withdrawn: row.is_some(),
    }))
}

/// `GET /v1/consent/{mode}/{address}`
pub async fn list_user_consents(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((mode, address)): Path<(String, String)>,
) -> Result<Json<Reply<ConsentListResponse>>, ApiError> {
    let event = event_for("consent list", &caller);

    let rows = audited(&state.store, event, |ev| {
        let (mode, address) = addressed(&state, ev, &mode, &address)?;
        let identity = authorized_identity(&state, &caller, mode, &address, ev)?;
        repository(&state).list_for_identity(&identity)
    })?;
    Ok(reply(ConsentListResponse {
        total: rows.len(),
        rows,
    }))
}

/// `GET /v1/consents/{brief}`: every row for one brief. Admin only.
pub async fn list_brief_consents(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(brief_name): Path<String>,
) -> Result<Json<Reply<ConsentListResponse>>, ApiError> {
    require_admin(&caller)?;
    let brief = brief(&brief_name)?;
    let rows = repository(&state).list_by_brief(&brief)?;
    Ok(reply(ConsentListResponse {
        total: rows.len(),
        rows,
    }))
}

/// `GET /v1/consents`: distinct brief names. Admin only.
pub async fn list_briefs(
    State(state): State<AppState>,
    Auth(caller): Auth,
) -> Result<Json<Reply<BriefListResponse>>, ApiError> {
    require_admin(&caller)?;
    let briefs = repository(&state).list_briefs()?;
    Ok(reply(BriefListResponse {
        total: briefs.len(),
        briefs,
    }))
}
