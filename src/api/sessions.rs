// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{addressed, event_for, locate, reply, Page, PageQuery, Reply};
use crate::{
    auth::{enforce_auth, Auth},
    error::ApiError,
    state::AppState,
    storage::{
        audited,
        repository::{SessionRepository, SessionView},
        AuditEvent,
    },
};

fn default_expiration() -> String {
    "1d".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default = "default_expiration")]
    pub expiration: String,
    #[serde(default)]
    pub meta: Value,
}

#[derive(Debug, Serialize)]
pub struct SessionCreatedResponse {
    pub session: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: String,
    pub token: String,
    pub data: Value,
}

/// Client address as reported by the fronting proxy.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded.or(real).map(str::to_string)
}

/// `POST /v1/session/{mode}/{address}`
pub async fn create_session(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((mode, address)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<Reply<SessionCreatedResponse>>, ApiError> {
    let event = event_for("create session", &caller);
    let ip = client_ip(&headers);

    let session = audited(&state.store, event, |ev| {
        let (mode, address) = addressed(&state, ev, &mode, &address)?;
        let user = locate(&state, &caller, mode, &address, ev)?;
        let meta = if request.meta.is_null() {
            Value::Object(Default::default())
        } else {
            request.meta.clone()
        };
        SessionRepository::new(&state.store, &state.keys, state.region()).generate(
            &user.token,
            ip.as_deref(),
            &request.expiration,
            &state.config.policy.max_session_retention_period,
            &meta,
        )
    })?;
    Ok(reply(SessionCreatedResponse { session }))
}

/// `GET /v1/session/{mode}/{address}`
pub async fn list_sessions(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((mode, address)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Reply<Page<SessionView>>>, ApiError> {
    let event = event_for("list sessions", &caller);

    let page = audited(&state.store, event, |ev| {
        let (mode, address) = addressed(&state, ev, &mode, &address)?;
        let user = locate(&state, &caller, mode, &address, ev)?;
        let (rows, total) = SessionRepository::new(&state.store, &state.keys, state.region())
            .list_for_user(&user.token, page.offset, page.limit)?;
        Ok(Page { total, rows })
    })?;
    Ok(reply(page))
}

/// `GET /v1/session/id/{session}`
pub async fn get_session(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(session): Path<String>,
) -> Result<Json<Reply<SessionResponse>>, ApiError> {
    let event = AuditEvent::new("get session").with_who(caller.audit_label());

    let response = audited(&state.store, event, |ev| {
        let (token, data) = SessionRepository::new(&state.store, &state.keys, state.region())
            .get(&session, |owner| {
                ev.set_record(owner);
                Ok(enforce_auth(&caller, owner)?)
            })?;
        Ok(SessionResponse {
            session: session.clone(),
            token,
            data,
        })
    })?;
    Ok(reply(response))
}
