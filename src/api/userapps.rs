// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-app user record endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use super::users::{queue_request, ActionOutcome, TokenResponse};
use super::{addressed, event_for, locate, reply, Reply};
use crate::{
    auth::{decide, require_admin, Auth, AuthError, Caller, Decision},
    error::{ApiError, VaultError, VaultResult},
    state::AppState,
    storage::{
        audited,
        repository::{RequestAction, UserAppRepository, UserRecord},
        AuditEvent,
    },
    validation::{is_valid_app, IndexMode},
};

#[derive(Debug, Serialize)]
pub struct AppRecordResponse {
    pub token: String,
    pub app: String,
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct AppListResponse {
    pub total: usize,
    pub apps: Vec<String>,
}

fn repository(state: &AppState) -> UserAppRepository<'_> {
    UserAppRepository::new(&state.store, &state.keys, state.region())
}

/// Resolve the user and check the caller may touch `app` on it. App
/// tokens reach only their own app's record.
fn app_target(
    state: &AppState,
    caller: &Caller,
    token: &str,
    app: &str,
    event: &mut AuditEvent,
) -> VaultResult<UserRecord> {
    let (mode, token) = addressed(state, event, IndexMode::Token.as_str(), token)?;
    if !is_valid_app(app) {
        return Err(VaultError::Validation("bad app name".to_string()));
    }
    let user = locate(state, caller, mode, &token, event)?;
    if caller.app.as_deref().is_some_and(|own| own != app) {
        return Err(AuthError::new(format!("token of another app used for {app}")).into());
    }
    Ok(user)
}

/// Apply a patch to an app record.
pub(crate) fn apply_app_change(state: &AppState, token: &str, app: &str, patch: &Value) -> VaultResult<()> {
    repository(state).change(token, app, patch)?;
    tracing::info!(token = %token, app = %app, "App record changed");
    Ok(())
}

/// `POST /v1/userapp/token/{token}/{app}`
pub async fn create_app_record(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((token, app)): Path<(String, String)>,
    Json(data): Json<Value>,
) -> Result<Json<Reply<TokenResponse>>, ApiError> {
    let event = event_for(&format!("create app record: {app}"), &caller);

    let token = audited(&state.store, event, |ev| {
        let user = app_target(&state, &caller, &token, &app, ev)?;
        repository(&state).create(&user.token, &app, &data)?;
        Ok(user.token)
    })?;
    Ok(reply(TokenResponse { token }))
}

/// `GET /v1/userapp/token/{token}/{app}`
pub async fn get_app_record(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((token, app)): Path<(String, String)>,
) -> Result<Json<Reply<AppRecordResponse>>, ApiError> {
    let event = event_for(&format!("get app record: {app}"), &caller);

    let response = audited(&state.store, event, |ev| {
        let user = app_target(&state, &caller, &token, &app, ev)?;
        let data = repository(&state).get(&user.token, &app)?;
        Ok(AppRecordResponse {
            token: user.token,
            app: app.clone(),
            data,
        })
    })?;
    Ok(reply(response))
}

/// `PUT /v1/userapp/token/{token}/{app}`: merge a patch into the app
/// record, or queue a change-me request naming the app when the app is not
/// listed in `self_service.app_record_change`.
pub async fn change_app_record(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((token, app)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<Json<Reply<ActionOutcome>>, ApiError> {
    let event = event_for(&format!("change app record: {app}"), &caller);

    let outcome = audited(&state.store, event, |ev| {
        let user = app_target(&state, &caller, &token, &app, ev)?;
        if !patch.is_object() {
            return Err(VaultError::Validation("app record must be a JSON object".into()));
        }
        match decide(&caller, RequestAction::ChangeMe, Some(&app), &state.config.self_service) {
            Decision::QueueAsRequest => queue_request(
                &state,
                &user.token,
                RequestAction::ChangeMe,
                Some(&app),
                Some(&patch),
                ev,
            ),
            Decision::ExecuteDirectly => {
                apply_app_change(&state, &user.token, &app, &patch)?;
                Ok(ActionOutcome::Done { token: user.token })
            }
        }
    })?;
    Ok(reply(outcome))
}

/// `GET /v1/userapp/token/{token}`: apps holding a record for the user.
pub async fn list_user_apps(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(token): Path<String>,
) -> Result<Json<Reply<AppListResponse>>, ApiError> {
    let event = event_for("list app records", &caller);

    let apps = audited(&state.store, event, |ev| {
        let (mode, token) = addressed(&state, ev, IndexMode::Token.as_str(), &token)?;
        let user = locate(&state, &caller, mode, &token, ev)?;
        repository(&state).list_for_user(&user.token)
    })?;
    Ok(reply(AppListResponse {
        total: apps.len(),
        apps,
    }))
}

/// `GET /v1/userapps`: every app name in use. Admin only.
pub async fn list_apps(
    State(state): State<AppState>,
    Auth(caller): Auth,
) -> Result<Json<Reply<AppListResponse>>, ApiError> {
    require_admin(&caller)?;
    let apps = repository(&state).list_apps()?;
    Ok(reply(AppListResponse {
        total: apps.len(),
        apps,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{call, test_app};
    use crate::config::Config;
    use crate::storage::repository::XtokenRepository;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn admin_manages_app_records() {
        let (app, _state, root, _dir) = test_app(Config::default());
        let (_, user) = call(&app, Method::POST, "/v1/user", Some(&root), Some(json!({"name": "Ada"}))).await;
        let token = user["token"].as_str().unwrap();
        let uri = format!("/v1/userapp/token/{token}/shop");

        let (status, body) = call(&app, Method::POST, &uri, Some(&root), Some(json!({"size": "M"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token"], token);

        let (status, _) = call(&app, Method::POST, &uri, Some(&root), Some(json!({"size": "S"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(&app, Method::PUT, &uri, Some(&root), Some(json!({"size": "L"}))).await;
        assert_eq!(body["result"], "done");

        let (status, body) = call(&app, Method::GET, &uri, Some(&root), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["app"], "shop");
        assert_eq!(body["data"]["size"], "L");

        call(&app, Method::POST, &format!("/v1/userapp/token/{token}/crm"), Some(&root), Some(json!({}))).await;
        let (_, body) = call(&app, Method::GET, &format!("/v1/userapp/token/{token}"), Some(&root), None).await;
        assert_eq!(body["apps"], json!(["shop", "crm"]));

        let (_, body) = call(&app, Method::GET, "/v1/userapps", Some(&root), None).await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["apps"], json!(["crm", "shop"]));
    }

    #[tokio::test]
    async fn app_change_follows_the_app_allow_list() {
        let mut config = Config::default();
        config.self_service.app_record_change = vec!["shop".to_string()];
        let (app, state, root, _dir) = test_app(config);
        let (_, user) = call(&app, Method::POST, "/v1/user", Some(&root), Some(json!({"name": "Ada"}))).await;
        let token = user["token"].as_str().unwrap();
        let login = XtokenRepository::new(&state.store, &state.keys)
            .create_login(token)
            .unwrap();

        let shop = format!("/v1/userapp/token/{token}/shop");
        let crm = format!("/v1/userapp/token/{token}/crm");
        call(&app, Method::POST, &shop, Some(&root), Some(json!({"size": "M"}))).await;
        call(&app, Method::POST, &crm, Some(&root), Some(json!({"tier": 1}))).await;

        let (_, body) = call(&app, Method::PUT, &shop, Some(&login), Some(json!({"size": "L"}))).await;
        assert_eq!(body["result"], "done");

        let (_, body) = call(&app, Method::PUT, &crm, Some(&login), Some(json!({"tier": 2}))).await;
        assert_eq!(body["result"], "request-created");
        let rtoken = body["rtoken"].as_str().unwrap();

        let (_, detail) = call(&app, Method::GET, &format!("/v1/request/{rtoken}"), Some(&login), None).await;
        assert_eq!(detail["app"], "crm");
        assert_eq!(detail["original"]["tier"], 1);
        assert_eq!(detail["change"]["tier"], 2);

        let (status, _) = call(&app, Method::POST, &format!("/v1/request/{rtoken}"), Some(&root), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, Method::GET, &crm, Some(&root), None).await;
        assert_eq!(body["data"]["tier"], 2);
    }

    #[tokio::test]
    async fn app_tokens_reach_only_their_own_app() {
        let (app, state, root, _dir) = test_app(Config::default());
        let (_, user) = call(&app, Method::POST, "/v1/user", Some(&root), Some(json!({"name": "Ada"}))).await;
        let token = user["token"].as_str().unwrap();
        let shop = XtokenRepository::new(&state.store, &state.keys)
            .create_app(token, "shop")
            .unwrap();

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/v1/userapp/token/{token}/shop"),
            Some(&shop),
            Some(json!({"size": "M"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, Method::GET, &format!("/v1/userapp/token/{token}/crm"), Some(&shop), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, Method::GET, "/v1/userapps", Some(&shop), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, Method::GET, &format!("/v1/userapp/token/{token}/Bad_Name"), Some(&root), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forgetting_a_user_drops_app_records() {
        let (app, _state, root, _dir) = test_app(Config::default());
        let (_, user) = call(&app, Method::POST, "/v1/user", Some(&root), Some(json!({"name": "Ada"}))).await;
        let token = user["token"].as_str().unwrap();
        call(&app, Method::POST, &format!("/v1/userapp/token/{token}/shop"), Some(&root), Some(json!({}))).await;

        call(&app, Method::DELETE, &format!("/v1/user/token/{token}"), Some(&root), None).await;
        let (_, body) = call(&app, Method::GET, "/v1/userapps", Some(&root), None).await;
        assert_eq!(body["total"], 0);
    }
}
