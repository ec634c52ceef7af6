// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Settings are read from a JSON file (`--conf`, default `databunker.json`)
//! and then overridden from the environment. A missing file is not an error:
//! every section has defaults.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BUNKER_MASTERKEY` | Master key (64 hex chars) | Required in normal mode |
//! | `BUNKER_HOST` | Server bind address | `0.0.0.0` |
//! | `BUNKER_PORT` | Server bind port | `3000` |
//! | `BUNKER_DEFAULT_COUNTRY` | Region for phone numbers without country code | `US` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::Path;

use serde::Deserialize;

/// Environment variable holding the master key.
pub const MASTER_KEY_ENV: &str = "BUNKER_MASTERKEY";

/// Environment variable overriding `server.host`.
pub const HOST_ENV: &str = "BUNKER_HOST";

/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "BUNKER_PORT";

/// Environment variable overriding `sms.default_country`.
pub const DEFAULT_COUNTRY_ENV: &str = "BUNKER_DEFAULT_COUNTRY";

/// Log output format (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const DEFAULT_DB_FILE: &str = "databunker.redb";

pub const DEFAULT_CONF_FILE: &str = "databunker.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenericConfig {
    pub create_user_without_access_token: bool,
    pub admin_email: String,
    /// Identity (email or phone) allowed to use the demo login code.
    /// Only honoured in builds with the `dev` feature.
    pub demo_identity: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelfServiceConfig {
    pub forget_me: bool,
    pub user_record_change: bool,
    pub app_record_change: Vec<String>,
    pub consent_change: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub profile_notification_url: String,
    pub forgetme_notification_url: String,
    pub consent_notification_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub max_audit_retention_period: String,
    pub max_session_retention_period: String,
    pub max_shareable_record_retention_period: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub default_country: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            default_country: "US".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generic: GenericConfig,
    pub self_service: SelfServiceConfig,
    pub notification: NotificationConfig,
    pub policy: PolicyConfig,
    pub sms: SmsConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load the file (if present) and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            Self::from_json(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?
        } else {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.server.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: PORT_ENV,
                value: port,
            })?;
        }
        if let Some(country) = lookup(DEFAULT_COUNTRY_ENV) {
            self.sms.default_country = country;
        }
        Ok(())
    }

    /// Warn about notification URLs that will never work.
    pub fn check_notification_urls(&self) {
        let urls = [
            ("profile_notification_url", &self.notification.profile_notification_url),
            ("forgetme_notification_url", &self.notification.forgetme_notification_url),
            ("consent_notification_url", &self.notification.consent_notification_url),
        ];
        for (name, value) in urls {
            if !value.is_empty() && url::Url::parse(value).is_err() {
                tracing::warn!(setting = name, url = %value, "Invalid notification URL, notifications will fail");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_sections_missing() {
        let config = Config::from_json("{}").unwrap();
        assert!(!config.generic.create_user_without_access_token);
        assert!(!config.self_service.forget_me);
        assert_eq!(config.sms.default_country, "US");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn parses_nested_sections() {
        let raw = r#"{
            "generic": {"create_user_without_access_token": true},
            "self_service": {"forget_me": true, "app_record_change": ["shop*"]},
            "policy": {"max_audit_retention_period": "6m"},
            "sms": {"default_country": "IL"}
        }"#;
        let config = Config::from_json(raw).unwrap();
        assert!(config.generic.create_user_without_access_token);
        assert!(config.self_service.forget_me);
        assert_eq!(config.self_service.app_record_change, vec!["shop*".to_string()]);
        assert_eq!(config.policy.max_audit_retention_period, "6m");
        assert_eq!(config.sms.default_country, "IL");
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [(HOST_ENV, "127.0.0.1"), (PORT_ENV, "8081")].into();
        let mut config = Config::default();
        config
            .apply_env(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut config = Config::default();
        let result = config.apply_env(|name| (name == PORT_ENV).then(|| "http".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidEnv { name: PORT_ENV, .. })));
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert!(!config.server.host.is_empty());
    }

    #[test]
    fn unreadable_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
