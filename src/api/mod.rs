// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP surface.
//!
//! Handlers are thin: classify the caller, run one repository operation
//! inside an audit scope, and map the typed error to a status.

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    auth::{enforce_auth, AuthError, Caller},
    error::{VaultError, VaultResult},
    state::AppState,
    storage::{repository::UserRecord, repository::UserRepository, AuditEvent},
    validation::{normalize_address, parse_mode, IndexMode},
};

pub mod audit;
pub mod consent;
pub mod health;
pub mod login;
pub mod requests;
pub mod sessions;
pub mod shared;
pub mod userapps;
pub mod users;
pub mod xtokens;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/user", post(users::create_user))
        .route(
            "/user/{mode}/{address}",
            get(users::get_user)
                .put(users::change_user)
                .delete(users::delete_user),
        )
        .route("/login/{mode}/{address}", get(login::request_code))
        .route("/enter/{mode}/{address}/{code}", get(login::enter_code))
        .route(
            "/session/{mode}/{address}",
            post(sessions::create_session).get(sessions::list_sessions),
        )
        .route("/session/id/{session}", get(sessions::get_session))
        .route("/requests", get(requests::list_requests))
        .route(
            "/request/{request}",
            get(requests::get_request)
                .post(requests::approve_request)
                .delete(requests::cancel_request),
        )
        .route(
            "/consent/{mode}/{address}/{brief}",
            post(consent::accept_consent).delete(consent::withdraw_consent),
        )
        .route("/consent/{mode}/{address}", get(consent::list_user_consents))
        .route("/consents/{brief}", get(consent::list_brief_consents))
        .route("/consents", get(consent::list_briefs))
        .route("/sharedrecord/token/{token}", post(shared::create_shared_record))
        .route("/get/{record}", get(shared::get_shared_record))
        .route("/audit/list/{token}", get(audit::list_events))
        .route("/audit/get/{atoken}", get(audit::get_event))
        .route("/xtoken/api/{name}", post(xtokens::create_api_token))
        .route("/xtoken/app/{token}/{app}", post(xtokens::create_app_token))
        .route(
            "/userapp/token/{token}/{app}",
            post(userapps::create_app_record)
                .get(userapps::get_app_record)
                .put(userapps::change_app_record),
        )
        .route("/userapp/token/{token}", get(userapps::list_user_apps))
        .route("/userapps", get(userapps::list_apps));

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Shared handler helpers
// ============================================================================

/// Success envelope: `{"status":"ok", ...body}`.
#[derive(Debug, Serialize)]
pub struct Reply<T> {
    pub status: &'static str,
    #[serde(flatten)]
    pub body: T,
}

pub fn reply<T: Serialize>(body: T) -> Json<Reply<T>> {
    Json(Reply { status: "ok", body })
}

/// `offset` / `limit` query parameters. Both default to 0, which lists
/// everything.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

/// A page of rows with the total count.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub total: u64,
    pub rows: Vec<T>,
}

/// Audit event attributed to the caller.
pub(crate) fn event_for(title: &str, caller: &Caller) -> AuditEvent {
    AuditEvent::new(title).with_who(caller.audit_label())
}

/// Parse and normalize a `/:mode/:address` pair and note it on the event.
/// Called inside the audit scope so malformed addresses are recorded too.
pub(crate) fn addressed(
    state: &AppState,
    event: &mut AuditEvent,
    mode: &str,
    address: &str,
) -> VaultResult<(IndexMode, String)> {
    let mode = parse_mode(mode)?;
    event.mode = Some(mode);
    let address = normalize_address(mode, address, state.region())?;
    event.set_address(&state.keys, mode, &address);
    Ok((mode, address))
}

/// Find the addressed user and check the caller may act on it.
///
/// Non-admin callers get access denied for a missing record, so they cannot
/// tell which addresses exist.
pub(crate) fn locate(
    state: &AppState,
    caller: &Caller,
    mode: IndexMode,
    address: &str,
    event: &mut AuditEvent,
) -> VaultResult<UserRecord> {
    let users = UserRepository::new(&state.store, &state.keys, state.region());
    match users.find(mode, address)? {
        Some(user) => {
            event.set_record(&user.token);
            enforce_auth(caller, &user.token)?;
            Ok(user)
        }
        None if caller.is_admin() => Err(VaultError::NotFound),
        None => Err(AuthError::new("target record does not exist").into()),
    }
}
