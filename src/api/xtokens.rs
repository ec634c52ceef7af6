// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token issuance.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{reply, Reply};
use crate::{
    auth::{require_admin, require_root, Auth},
    error::{ApiError, VaultError},
    state::AppState,
    storage::{
        audited,
        repository::{UserRepository, XtokenRepository},
        AuditEvent,
    },
    validation::is_valid_app,
};

#[derive(Debug, Serialize)]
pub struct XtokenResponse {
    pub xtoken: String,
}

fn check_name(name: &str) -> Result<(), VaultError> {
    if is_valid_app(name) {
        Ok(())
    } else {
        Err(VaultError::Validation("bad name".to_string()))
    }
}

/// `POST /v1/xtoken/api/{name}`: a new admin-level api token. Root only.
pub async fn create_api_token(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path(name): Path<String>,
) -> Result<Json<Reply<XtokenResponse>>, ApiError> {
    let event = AuditEvent::new("create api token").with_who(caller.audit_label());

    let xtoken = audited(&state.store, event, |_| {
        require_root(&caller)?;
        check_name(&name)?;
        XtokenRepository::new(&state.store, &state.keys).create_api(&name)
    })?;
    tracing::info!(name = %name, "Api token created");
    Ok(reply(XtokenResponse { xtoken }))
}

/// `POST /v1/xtoken/app/{token}/{app}`: a token scoped to one user record
/// and app.
pub async fn create_app_token(
    State(state): State<AppState>,
    Auth(caller): Auth,
    Path((token, app)): Path<(String, String)>,
) -> Result<Json<Reply<XtokenResponse>>, ApiError> {
    let event = AuditEvent::new("create app token")
        .with_who(caller.audit_label())
        .with_record(&token);

    let xtoken = audited(&state.store, event, |_| {
        require_admin(&caller)?;
        check_name(&app)?;
        UserRepository::new(&state.store, &state.keys, state.region()).find_by_token(&token)?;
        XtokenRepository::new(&state.store, &state.keys).create_app(&token, &app)
    })?;
    Ok(reply(XtokenResponse { xtoken }))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{call, test_app};
    use crate::config::Config;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn root_issues_api_tokens_that_act_as_admin() {
        let (app, _state, root, _dir) = test_app(Config::default());

        let (status, body) = call(&app, Method::POST, "/v1/xtoken/api/billing", Some(&root), None).await;
        assert_eq!(status, StatusCode::OK);
        let api = body["xtoken"].as_str().unwrap().to_string();

        let (status, _) = call(&app, Method::POST, "/v1/user", Some(&api), Some(json!({"name": "N"}))).await;
        assert_eq!(status, StatusCode::OK);

        // Api tokens cannot mint further api tokens.
        let (status, _) = call(&app, Method::POST, "/v1/xtoken/api/other", Some(&api), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, Method::POST, "/v1/xtoken/api/Bad_Name", Some(&root), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn app_token_is_bound_to_its_user() {
        let (app, _state, root, _dir) = test_app(Config::default());
        let (_, a) = call(&app, Method::POST, "/v1/user", Some(&root), Some(json!({"name": "A"}))).await;
        let (_, b) = call(&app, Method::POST, "/v1/user", Some(&root), Some(json!({"name": "B"}))).await;
        let a = a["token"].as_str().unwrap();
        let b = b["token"].as_str().unwrap();

        let (status, body) = call(&app, Method::POST, &format!("/v1/xtoken/app/{a}/shop"), Some(&root), None).await;
        assert_eq!(status, StatusCode::OK);
        let shop = body["xtoken"].as_str().unwrap().to_string();

        let (status, body) = call(&app, Method::GET, &format!("/v1/user/token/{a}"), Some(&shop), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "A");
        let (status, _) = call(&app, Method::GET, &format!("/v1/user/token/{b}"), Some(&shop), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/xtoken/app/6f9619ff-8b86-4011-b42d-00c04fc964ff/shop",
            Some(&root),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
