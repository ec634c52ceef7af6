// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Data-subject request queue.
//!
//! Listing and approval are admin operations. The subject of a request may
//! read and cancel it.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::userapps::apply_app_change;
use super::users::{apply_change, forget_user};
use super::{reply, Page, Reply};
use crate::{
    auth::{enforce_auth, require_admin, Auth},
    error::{ApiError, VaultError},
    state::AppState,
    storage::{
        audited,
        repository::{RequestAction, RequestDetail, RequestRecord, RequestRepository, RequestStatus},
        AuditEvent,
    },
};

#[derive(Debug, Default, Deserialize)]
pub struct RequestsQuery {
    pub status: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct RequestStatusResponse {
    pub rtoken: String,
    pub result: RequestStatus,
}

fn repository(state: &AppState) -> RequestRepository<'_> {
    RequestRepository::new(&state.store, &state.keys, state.region())
}

/// `GET /v1/requests?status=open`
pub async fn list_requests(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Query(query): Query<RequestsQuery>,
) -> Result<Json<Reply<Page<RequestRecord>>>, ApiError> {
    require_admin(&caller)?;
    let status = match query.status.as_deref() {
        None | Some("") => RequestStatus::Open,
        Some(raw) => RequestStatus::parse(raw)
            .ok_or_else(|| VaultError::Validation("bad status".to_string()))?,
    };
    let (rows, total) = repository(&state).list(status, query.offset, query.limit)?;
    Ok(reply(Page { total, rows }))
}

/// `GET /v1/request/{request}`: the request with the current profile and
/// the proposed change.
pub async fn get_request(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(rtoken): Path<String>,
) -> Result<Json<Reply<RequestDetail>>, ApiError> {
    let event = AuditEvent::new("get request")
        .with_who(caller.audit_label())
        .with_request(&rtoken);

    let detail = audited(&state.store, event, |ev| {
        let request = repository(&state).get(&rtoken)?;
        ev.set_record(&request.token);
        enforce_auth(&caller, &request.token)?;
        repository(&state).detail(&rtoken)
    })?;
    Ok(reply(detail))
}

/// `POST /v1/request/{request}`: approve and carry out the request.
pub async fn approve_request(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(rtoken): Path<String>,
) -> Result<Json<Reply<RequestStatusResponse>>, ApiError> {
    let event = AuditEvent::new("approve request")
        .with_who(caller.audit_label())
        .with_request(&rtoken);

    let approved = audited(&state.store, event, |ev| {
        require_admin(&caller)?;
        let repo = repository(&state);
        let approved = repo.approve(&rtoken, |request| match request.action {
            RequestAction::ForgetMe => {
                if !forget_user(&state, &request.token)? {
                    tracing::info!(rtoken = %request.rtoken, "Forget-me subject already gone");
                }
                Ok(())
            }
            RequestAction::ChangeMe => {
                let change = repo
                    .change_payload(request)?
                    .ok_or_else(|| VaultError::Validation("request has no change".to_string()))?;
                match &request.app {
                    Some(app) => apply_app_change(&state, &request.token, app, &change),
                    None => apply_change(&state, &request.token, &change),
                }
            }
        })?;
        ev.set_record(&approved.token);
        Ok(approved)
    })?;

    tracing::info!(rtoken = %rtoken, action = %approved.action, "Request approved");
    Ok(reply(RequestStatusResponse {
        rtoken,
        result: approved.status,
    }))
}

/// `DELETE /v1/request/{request}`: cancel an open request.
pub async fn cancel_request(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(rtoken): Path<String>,
) -> Result<Json<Reply<RequestStatusResponse>>, ApiError> {
    let event = AuditEvent::new("cancel request")
        .with_who(caller.audit_label())
        .with_request(&rtoken);

    let cancelled = audited(&state.store, event, |ev| {
        let repo = repository(&state);
        let request = repo.get(&rtoken)?;
        ev.set_record(&request.token);
        enforce_auth(&caller, &request.token)?;
        repo.cancel(&rtoken)
    })?;
    Ok(reply(RequestStatusResponse {
        rtoken,
        result: cancelled.status,
    }))
}
