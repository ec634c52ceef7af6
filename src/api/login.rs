// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Passwordless login endpoints. Neither needs an access token.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{addressed, reply, Reply};
use crate::{
    auth::login::{request_login_code, verify_login_code},
    error::ApiError,
    state::AppState,
    storage::{audited, AuditEvent},
};

#[derive(Debug, Serialize)]
pub struct CodeSentResponse {
    pub result: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EnterResponse {
    pub xtoken: String,
    pub token: String,
}

/// `GET /v1/login/{mode}/{address}`: send a login code. The answer is the
/// same whether or not the address belongs to a user.
pub async fn request_code(
    State(state): State<AppState>,
    Path((mode, address)): Path<(String, String)>,
) -> Result<Json<Reply<CodeSentResponse>>, ApiError> {
    let event = AuditEvent::new("request login code").with_who("anonymous");

    audited(&state.store, event, |ev| {
        let (mode, address) = addressed(&state, ev, &mode, &address)?;
        if let Some(token) = request_login_code(&state, mode, &address)? {
            ev.set_record(&token);
        }
        Ok(())
    })?;
    Ok(reply(CodeSentResponse { result: "code-sent" }))
}

/// `GET /v1/enter/{mode}/{address}/{code}`: exchange a login code for a
/// `login` token.
pub async fn enter_code(
    State(state): State<AppState>,
    Path((mode, address, code)): Path<(String, String, String)>,
) -> Result<Json<Reply<EnterResponse>>, ApiError> {
    let event = AuditEvent::new("enter login code").with_who("anonymous");

    let (xtoken, token) = audited(&state.store, event, |ev| {
        let (mode, address) = addressed(&state, ev, &mode, &address)?;
        let (xtoken, token) = verify_login_code(&state, mode, &address, &code)?;
        ev.set_record(&token);
        Ok((xtoken, token))
    })?;
    Ok(reply(EnterResponse { xtoken, token }))
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::tests::call;
    use crate::config::Config;
    use crate::notify::tests::CapturingSender;
    use crate::state::tests::test_state;
    use crate::storage::repository::UserRepository;
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn login_code_flow_over_http() {
        let sender = Arc::new(CapturingSender::default());
        let (state, _dir) = test_state(Config::default());
        let state = state.with_sender(sender.clone());
        let (token, _) = UserRepository::new(&state.store, &state.keys, "US")
            .create(&json!({"email": "kim@example.com", "name": "Kim"}))
            .unwrap();
        let app = router(state);

        let (status, body) = call(&app, Method::GET, "/v1/login/email/kim@example.com", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "code-sent");

        // Unknown addresses get the same answer.
        let (status, unknown) = call(&app, Method::GET, "/v1/login/email/nobody@example.com", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unknown, body);

        let code = sender.last_code().unwrap();
        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/v1/enter/email/kim@example.com/{code}"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token"], token.as_str());
        let xtoken = body["xtoken"].as_str().unwrap();

        let (status, body) = call(&app, Method::GET, "/v1/user/email/kim@example.com", Some(xtoken), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Kim");
    }

    #[tokio::test]
    async fn wrong_code_is_access_denied() {
        let (state, _dir) = test_state(Config::default());
        UserRepository::new(&state.store, &state.keys, "US")
            .create(&json!({"email": "kim@example.com"}))
            .unwrap();
        let app = router(state);

        let (status, body) = call(&app, Method::GET, "/v1/enter/email/kim@example.com/123456", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "access denied");
    }

    #[tokio::test]
    async fn login_by_token_mode_is_rejected() {
        let (state, _dir) = test_state(Config::default());
        let app = router(state);
        let (status, _) = call(
            &app,
            Method::GET,
            "/v1/login/token/6f9619ff-8b86-4011-b42d-00c04fc964ff",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
