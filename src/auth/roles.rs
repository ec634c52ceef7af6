// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access token roles.

use serde::{Deserialize, Serialize};

/// Role carried by an access token (xtoken).
///
/// ## Role Hierarchy
///
/// - `Root` - Created once at init. Full access, may mint api tokens
/// - `Api` - Backend service token. Full access to every record
/// - `App` - Issued per user and app. Access to that user's record only
/// - `Login` - Issued after a verified login code, one hour lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Root,
    Api,
    App,
    Login,
}

impl TokenType {
    /// Root and api tokens may act on any record.
    pub fn is_admin(&self) -> bool {
        matches!(self, TokenType::Root | TokenType::Api)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Root => "root",
            TokenType::Api => "api",
            TokenType::App => "app",
            TokenType::Login => "login",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_root_and_api_are_admin() {
        assert!(TokenType::Root.is_admin());
        assert!(TokenType::Api.is_admin());
        assert!(!TokenType::App.is_admin());
        assert!(!TokenType::Login.is_admin());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TokenType::Login).unwrap(), r#""login""#);
        let parsed: TokenType = serde_json::from_str(r#""api""#).unwrap();
        assert_eq!(parsed, TokenType::Api);
    }
}
