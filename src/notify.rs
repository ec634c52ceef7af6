// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Outbound Notifications
//!
//! Webhooks fired after profile, forget-me and consent changes, plus the
//! boundary to the email/SMS adapters that deliver login codes.
//!
//! Delivery is best effort: every POST is spawned onto the runtime and never
//! awaited by the request that triggered it. Failures are logged and not
//! retried.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::NotificationConfig;

/// Timeout of one webhook POST.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotifyAction {
    ProfileCreated,
    ProfileChanged,
    ForgetMe,
    ConsentChanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub action: NotifyAction,
    pub token: String,
    pub data: Value,
}

/// Fire-and-forget webhook client.
#[derive(Clone)]
pub struct Notifier {
    http: Client,
    urls: NotificationConfig,
}

impl Notifier {
    pub fn new(urls: NotificationConfig) -> Self {
        let http = Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build HTTP client, using defaults");
                Client::new()
            });
        Self { http, urls }
    }

    pub fn profile_created(&self, token: &str, profile: &Value) {
        self.send(
            &self.urls.profile_notification_url,
            NotifyAction::ProfileCreated,
            token,
            profile.clone(),
        );
    }

    /// Sends the old and new profile.
    pub fn profile_changed(&self, token: &str, old: &Value, new: &Value) {
        self.send(
            &self.urls.profile_notification_url,
            NotifyAction::ProfileChanged,
            token,
            serde_json::json!({ "old": old, "new": new }),
        );
    }

    /// Sends the last profile of a deleted user.
    pub fn forget_me(&self, token: &str, last_profile: &Value) {
        self.send(
            &self.urls.forgetme_notification_url,
            NotifyAction::ForgetMe,
            token,
            last_profile.clone(),
        );
    }

    pub fn consent_changed(&self, token: &str, consent: Value) {
        self.send(
            &self.urls.consent_notification_url,
            NotifyAction::ConsentChanged,
            token,
            consent,
        );
    }

    fn send(&self, url: &str, action: NotifyAction, token: &str, data: Value) {
        if url.is_empty() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(?action, "No runtime available, notification dropped");
            return;
        };

        let http = self.http.clone();
        let url = url.to_string();
        let body = Notification {
            action,
            token: token.to_string(),
            data,
        };
        handle.spawn(async move {
            match http.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(?action, status = %resp.status(), "Notification delivered");
                }
                Ok(resp) => {
                    warn!(?action, status = %resp.status(), "Notification rejected");
                }
                Err(e) => {
                    warn!(?action, error = %e, "Notification failed");
                }
            }
        });
    }
}

// =============================================================================
// Login code delivery
// =============================================================================

/// Delivers login codes to users. Implemented by the email and SMS
/// adapters of the host deployment.
pub trait CodeSender: Send + Sync {
    fn send_email_code(&self, email: &str, code: &str);

    fn send_sms_code(&self, phone: &str, code: &str);
}

/// Default sender when no adapter is configured. Logs that a code was
/// requested, never the code itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlySender;

impl CodeSender for LogOnlySender {
    fn send_email_code(&self, _email: &str, _code: &str) {
        warn!("Login code requested by email but no email adapter is configured");
    }

    fn send_sms_code(&self, _phone: &str, _code: &str) {
        warn!("Login code requested by SMS but no SMS adapter is configured");
    }
}
