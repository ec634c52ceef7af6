// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;
use crate::storage::repository::XtokenRecord;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub service: String,
    /// Whether the store answers a read.
    pub store: String,
}

fn check_store(state: &AppState) -> String {
    match state.store.count_all::<XtokenRecord>() {
        Ok(_) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: store read failed");
            "unavailable".to_string()
        }
    }
}

/// `GET /health`: 200 when the store is readable, 503 otherwise. Needs no
/// access token.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = check_store(&state);
    let all_ok = store == "ok";

    let response = HealthResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            store,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{call, test_app};
    use crate::config::Config;
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn health_needs_no_token() {
        let (app, _state, _root, _dir) = test_app(Config::default());
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["store"], "ok");
    }
}
