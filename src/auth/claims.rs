// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The classified identity of a request.

use serde::Serialize;

use super::roles::TokenType;

/// Who is calling, resolved from the `X-Bunker-Token` header before any
/// handler logic runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub token_type: TokenType,
    /// User record the token is bound to (`app` and `login` tokens).
    pub user_token: Option<String>,
    /// App the token was issued for (`app` tokens).
    pub app: Option<String>,
    /// Free-form name (api tokens) used in audit events.
    pub name: Option<String>,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.token_type.is_admin()
    }

    /// Label written to the `who` field of audit events.
    pub fn audit_label(&self) -> String {
        match (&self.name, &self.app) {
            (Some(name), _) => format!("{}:{name}", self.token_type),
            (None, Some(app)) => format!("{}:{app}", self.token_type),
            (None, None) => self.token_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_label_prefers_name_then_app() {
        let mut caller = Caller {
            token_type: TokenType::Api,
            user_token: None,
            app: None,
            name: Some("billing".to_string()),
        };
        assert_eq!(caller.audit_label(), "api:billing");

        caller.token_type = TokenType::App;
        caller.name = None;
        caller.app = Some("shop".to_string());
        assert_eq!(caller.audit_label(), "app:shop");

        caller.token_type = TokenType::Login;
        caller.app = None;
        assert_eq!(caller.audit_label(), "login");
    }
}
