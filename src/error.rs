// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::AuthError;
use crate::crypto::CryptoError;
use crate::storage::StoreError;

/// Error taxonomy of the vault core.
///
/// Variants carry internal detail for logs and audit events only;
/// [`ApiError`] decides what a caller gets to see.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("access denied: {0}")]
    Auth(#[from] AuthError),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("{0}")]
    InvalidState(String),

    #[error("session expired")]
    SessionExpired,
}

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(field) => {
                VaultError::Validation(format!("duplicate index: {field}"))
            }
            other => VaultError::Store(other),
        }
    }
}

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not found")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "access denied")
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Auth(reason) => {
                tracing::info!(%reason, "Access denied");
                ApiError::forbidden()
            }
            VaultError::NotFound => ApiError::not_found(),
            VaultError::Crypto(CryptoError::Key | CryptoError::Decrypt) => {
                tracing::warn!(error = %err, "Record could not be opened");
                ApiError::not_found()
            }
            VaultError::Validation(message) => ApiError::bad_request(message),
            VaultError::InvalidState(message) => ApiError::new(StatusCode::CONFLICT, message),
            VaultError::SessionExpired => {
                ApiError::new(StatusCode::UNAUTHORIZED, "session expired")
            }
            VaultError::Store(_) | VaultError::Crypto(_) => {
                tracing::error!(error = %err, "Internal error");
                ApiError::internal()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        VaultError::from(err).into()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        VaultError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            status: "error",
            message: self.message,
        });
        (self.status, body).into_response()
    }
}
