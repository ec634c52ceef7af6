// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{reply, Reply};
use crate::{
    auth::{enforce_auth, Auth},
    error::{ApiError, VaultError},
    state::AppState,
    storage::{
        audited,
        repository::{parse_fields, SharedRecordRepository},
        AuditEvent,
    },
    validation::is_valid_app,
};

fn default_expiration() -> String {
    "1d".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateSharedRequest {
    /// Comma separated top-level profile fields. Empty shares everything.
    #[serde(default)]
    pub fields: String,
    pub app: Option<String>,
    #[serde(default = "default_expiration")]
    pub expiration: String,
}

#[derive(Debug, Serialize)]
pub struct SharedCreatedResponse {
    pub record: String,
}

#[derive(Debug, Serialize)]
pub struct SharedDataResponse {
    pub data: Value,
}

/// `POST /v1/sharedrecord/token/{token}`
pub async fn create_shared_record(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(token): Path<String>,
    Json(request): Json<CreateSharedRequest>,
) -> Result<Json<Reply<SharedCreatedResponse>>, ApiError> {
    let event = AuditEvent::new("create shared record")
        .with_who(caller.audit_label())
        .with_record(&token);

    let record = audited(&state.store, event, |_| {
        enforce_auth(&caller, &token)?;
        let app = request.app.as_deref().filter(|a| !a.is_empty());
        if app.is_some_and(|a| !is_valid_app(a)) {
            return Err(VaultError::Validation("bad app name".to_string()));
        }
        SharedRecordRepository::new(&state.store, &state.keys, state.region()).create(
            &token,
            parse_fields(&request.fields),
            app,
            &request.expiration,
            &state.config.policy.max_shareable_record_retention_period,
        )
    })?;
    Ok(reply(SharedCreatedResponse { record }))
}

/// `GET /v1/get/{record}`: the shared fields. The record token is the
/// credential, so no access token is needed.
pub async fn get_shared_record(
    State(state): State<AppState>,
    Path(record): Path<String>,
) -> Result<Json<Reply<SharedDataResponse>>, ApiError> {
    let event = AuditEvent::new("get shared record").with_who("shared-record");

    let data = audited(&state.store, event, |ev| {
        let (row, data) =
            SharedRecordRepository::new(&state.store, &state.keys, state.region()).get(&record)?;
        ev.set_record(&row.token);
        Ok(data)
    })?;
    Ok(reply(SharedDataResponse { data }))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{call, test_app};
    use crate::config::Config;
    use crate::storage::repository::XtokenRepository;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn shared_record_exposes_selected_fields() {
        let (app, _state, root, _dir) = test_app(Config::default());
        let (_, user) = call(
            &app,
            Method::POST,
            "/v1/user",
            Some(&root),
            Some(json!({"name": "Lee", "email": "lee@x.io", "city": "Oslo"})),
        )
        .await;
        let token = user["token"].as_str().unwrap();

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/v1/sharedrecord/token/{token}"),
            Some(&root),
            Some(json!({"fields": "name, city", "app": "crm", "expiration": "1h"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let record = body["record"].as_str().unwrap();

        let (status, body) = call(&app, Method::GET, &format!("/v1/get/{record}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"name": "Lee", "city": "Oslo"}));
    }

    #[tokio::test]
    async fn other_users_cannot_share() {
        let (app, state, root, _dir) = test_app(Config::default());
        let (_, a) = call(&app, Method::POST, "/v1/user", Some(&root), Some(json!({"name": "A"}))).await;
        let (_, b) = call(&app, Method::POST, "/v1/user", Some(&root), Some(json!({"name": "B"}))).await;
        let login_a = XtokenRepository::new(&state.store, &state.keys)
            .create_login(a["token"].as_str().unwrap())
            .unwrap();

        let uri = format!("/v1/sharedrecord/token/{}", b["token"].as_str().unwrap());
        let (status, _) = call(&app, Method::POST, &uri, Some(&login_a), Some(json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_record_is_not_found() {
        let (app, _state, _root, _dir) = test_app(Config::default());
        let (status, _) = call(&app, Method::GET, "/v1/get/missing", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
