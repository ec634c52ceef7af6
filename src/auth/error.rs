// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Access denied.
///
/// Unknown token, expired token, wrong role and wrong record all look the
/// same to the caller. The reason is kept for logs and audit events only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    reason: String,
}

#[derive(Serialize)]
struct AuthErrorBody {
    status: &'static str,
    message: &'static str,
}

impl AuthError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason)
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::info!(reason = %self.reason, "Access denied");
        let body = Json(AuthErrorBody {
            status: "error",
            message: "access denied",
        });
        (StatusCode::FORBIDDEN, body).into_response()
    }
}
