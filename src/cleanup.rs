// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cleanup Task
//!
//! The single periodic background task. Every `interval` (default 10 min)
//! it:
//! 1. Drops audit events older than `policy.max_audit_retention_period`.
//! 2. Drops sessions past their end time.
//! 3. Drops expired login tokens.
//! 4. Moves consents past their end time to `expired` and fires the consent
//!    notification for each.
//!
//! A failed step is logged and retried on the next tick.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`; the task finishes its current
//! sweep and returns.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::expiration::retention_seconds;
use crate::state::AppState;
use crate::storage::repository::{ConsentRepository, SessionRepository, XtokenRepository};
use crate::storage::AuditRepository;

/// Default interval between sweeps.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

/// Rows removed or changed by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub audit: u64,
    pub sessions: u64,
    pub xtokens: u64,
    pub consents: u64,
}

pub struct CleanupTask {
    state: AppState,
    interval: Duration,
}

impl CleanupTask {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(task.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Cleanup task starting");

        loop {
            if shutdown.is_cancelled() {
                info!("Cleanup task shutting down");
                return;
            }

            let report = self.sweep(Utc::now().timestamp());
            if report != SweepReport::default() {
                info!(
                    audit = report.audit,
                    sessions = report.sessions,
                    xtokens = report.xtokens,
                    consents = report.consents,
                    "Cleanup sweep finished"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Cleanup task shutting down");
                    return;
                }
            }
        }
    }

    /// One sweep at time `now`.
    pub fn sweep(&self, now: i64) -> SweepReport {
        let state = &self.state;
        let policy = &state.config.policy;
        let mut report = SweepReport::default();

        match retention_seconds(&policy.max_audit_retention_period) {
            Some(keep) => match AuditRepository::new(&state.store).delete_older_than(now - keep) {
                Ok(n) => report.audit = n,
                Err(e) => warn!(error = %e, "Cleanup: audit retention failed"),
            },
            None => debug!("Cleanup: audit retention disabled"),
        }

        let sessions = SessionRepository::new(&state.store, &state.keys, state.region());
        match sessions.delete_expired(now) {
            Ok(n) => report.sessions = n,
            Err(e) => warn!(error = %e, "Cleanup: session sweep failed"),
        }

        match XtokenRepository::new(&state.store, &state.keys).delete_expired(now) {
            Ok(n) => report.xtokens = n,
            Err(e) => warn!(error = %e, "Cleanup: login token sweep failed"),
        }

        let consent = ConsentRepository::new(&state.store, &state.keys, state.region());
        match consent.expire(now) {
            Ok(expired) => {
                report.consents = expired.len() as u64;
                for row in expired {
                    let token = row.token.clone();
                    match serde_json::to_value(&row) {
                        Ok(data) => state.notifier.consent_changed(&token, data),
                        Err(e) => warn!(error = %e, "Cleanup: failed to encode consent"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "Cleanup: consent expiry failed"),
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::state::tests::test_state;
    use crate::storage::repository::UserRepository;
    use crate::storage::{AuditEvent, Store};
    use crate::validation::IndexMode;
    use serde_json::json;

    fn audit_at(store: &Store, when: i64) {
        let mut event = AuditEvent::new("test event");
        event.when = when;
        AuditRepository::new(store).log(event).unwrap();
    }

    #[test]
    fn sweep_applies_every_retention_rule() {
        let mut config = Config::default();
        config.policy.max_audit_retention_period = "1d".to_string();
        let (state, _dir) = test_state(config);
        let now = Utc::now().timestamp();

        audit_at(&state.store, now - 2 * 86_400);
        audit_at(&state.store, now);

        let (token, _) = UserRepository::new(&state.store, &state.keys, "US")
            .create(&json!({"email": "z@z.io"}))
            .unwrap();
        SessionRepository::new(&state.store, &state.keys, "US")
            .generate(&token, None, "1h", "", &json!({}))
            .unwrap();
        XtokenRepository::new(&state.store, &state.keys)
            .create_login(&token)
            .unwrap();

        let consent = ConsentRepository::new(&state.store, &state.keys, "US");
        let who = consent.identity(IndexMode::Email, "z@z.io").unwrap();
        consent.accept(&who, "promo", None, Some(now + 60)).unwrap();

        let task = CleanupTask::new(state.clone());
        let report = task.sweep(now + 2 * 3_600);
        assert_eq!(
            report,
            SweepReport {
                audit: 1,
                sessions: 1,
                xtokens: 1,
                consents: 1,
            }
        );
        assert_eq!(task.sweep(now + 2 * 3_600), SweepReport::default());
    }

    #[test]
    fn audit_retention_disabled_by_default() {
        let (state, _dir) = test_state(Config::default());
        audit_at(&state.store, 1);
        let report = CleanupTask::new(state).sweep(Utc::now().timestamp());
        assert_eq!(report.audit, 0);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (state, _dir) = test_state(Config::default());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            CleanupTask::new(state)
                .with_interval(Duration::from_millis(10))
                .run(shutdown.clone()),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        handle.await.unwrap();
    }
}
