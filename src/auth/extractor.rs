// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for access tokens.
//!
//! Use the `Auth` extractor in handlers to require a valid token:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(caller): Auth) -> impl IntoResponse {
//!     // caller is a Caller
//! }
//! ```

use axum::{
    extract::{FromRequestParts, MatchedPath, RawPathParams},
    http::request::Parts,
};

use super::{AuthError, Caller};
use crate::error::{ApiError, VaultError, VaultResult};
use crate::state::AppState;
use crate::storage::{audited, repository::XtokenRepository, AuditEvent};
use crate::validation::{normalize_address, parse_mode};

/// Header carrying the access token.
pub const TOKEN_HEADER: &str = "X-Bunker-Token";

fn bearer(parts: &Parts) -> Result<Option<&str>, AuthError> {
    match parts.headers.get(TOKEN_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
            .map_err(|_| AuthError::new("access token header is not valid text")),
    }
}

fn resolve(state: &AppState, parts: &Parts) -> VaultResult<Option<Caller>> {
    match bearer(parts)? {
        None => Ok(None),
        Some(token) => XtokenRepository::new(&state.store, &state.keys)
            .resolve(token)
            .map(Some),
    }
}

/// Write a failed audit event for a request turned away before its
/// handler ran, linked to the addressed record when the path names one.
async fn reject(parts: &mut Parts, state: &AppState, err: VaultError) -> ApiError {
    let path = parts
        .extensions
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());
    let mut event = AuditEvent::new(format!("rejected {} {path}", parts.method)).with_who("unknown");

    if let Ok(params) = RawPathParams::from_request_parts(parts, state).await {
        let param = |name: &str| {
            params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        };
        if let Some(token) = param("token") {
            event.set_record(&token);
        }
        if let (Some(mode), Some(address)) = (param("mode"), param("address")) {
            if let Ok(mode) = parse_mode(&mode) {
                if let Ok(address) = normalize_address(mode, &address, state.region()) {
                    event.set_address(&state.keys, mode, &address);
                }
            }
        }
    }

    match audited(&state.store, event, |_| Err::<(), _>(err)) {
        Err(err) => err.into(),
        Ok(()) => ApiError::internal(),
    }
}

/// Extractor for a classified caller.
///
/// Rejects requests without a known, unexpired token. Every rejection is
/// audited.
pub struct Auth(pub Caller);

impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let result = resolve(state, parts)
            .and_then(|caller| caller.ok_or_else(|| AuthError::new("missing access token").into()));
        match result {
            Ok(caller) => {
                tracing::debug!(token_type = %caller.token_type, "Caller classified");
                Ok(Auth(caller))
            }
            Err(err) => Err(reject(parts, state, err).await),
        }
    }
}

/// Like [`Auth`], but a missing header yields `None`. A header that is
/// present must still be valid.
pub struct MaybeAuth(pub Option<Caller>);

impl FromRequestParts<AppState> for MaybeAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve(state, parts) {
            Ok(caller) => Ok(MaybeAuth(caller)),
            Err(err) => Err(reject(parts, state, err).await),
        }
    }
}
