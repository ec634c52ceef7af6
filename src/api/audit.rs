// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit trail reads. Users see the events about their own record.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;

use super::{reply, Page, PageQuery, Reply};
use crate::{
    auth::{enforce_auth, require_admin, Auth, AuthError},
    error::{ApiError, VaultError},
    state::AppState,
    storage::{AuditEvent, AuditRepository, AuditStatus},
    validation::IndexMode,
};

/// An audit event as returned over HTTP. The internal failure message is
/// left out.
#[derive(Debug, Serialize)]
pub struct AuditView {
    pub atoken: String,
    pub title: String,
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<IndexMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub who: Option<String>,
    pub when: i64,
}

impl From<AuditEvent> for AuditView {
    fn from(event: AuditEvent) -> Self {
        Self {
            atoken: event.atoken,
            title: event.title,
            status: event.status,
            record: event.record,
            request: event.request,
            mode: event.mode,
            address: event.address,
            who: event.who,
            when: event.when,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub event: AuditView,
}

/// `GET /v1/audit/list/{token}`
pub async fn list_events(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(token): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Reply<Page<AuditView>>>, ApiError> {
    enforce_auth(&caller, &token)?;
    let (events, total) =
        AuditRepository::new(&state.store).list_by_record(&token, page.offset, page.limit)?;
    let rows = events.into_iter().map(AuditView::from).collect();
    Ok(reply(Page { total, rows }))
}

/// `GET /v1/audit/get/{atoken}`
pub async fn get_event(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(atoken): Path<String>,
) -> Result<Json<Reply<EventResponse>>, ApiError> {
    let event = AuditRepository::new(&state.store).get(&atoken)?;
    let event = match event {
        Some(event) => event,
        None if caller.is_admin() => return Err(VaultError::NotFound.into()),
        None => return Err(AuthError::new("audit event does not exist").into()),
    };
    match &event.record {
        Some(record) => enforce_auth(&caller, record)?,
        None => require_admin(&caller)?,
    }
    Ok(reply(EventResponse {
        event: event.into(),
    }))
}
