// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::crypto::KeyManager;
use crate::notify::{CodeSender, LogOnlySender, Notifier};
use crate::storage::Store;

/// Shared application state, built once at startup and cloned into every
/// handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub keys: Arc<KeyManager>,
    pub config: Arc<Config>,
    pub notifier: Notifier,
    pub sender: Arc<dyn CodeSender>,
    /// Cancelled on SIGINT/SIGTERM; background tasks watch it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(store: Store, keys: KeyManager, config: Config) -> Self {
        let notifier = Notifier::new(config.notification.clone());
        Self {
            store: Arc::new(store),
            keys: Arc::new(keys),
            config: Arc::new(config),
            notifier,
            sender: Arc::new(LogOnlySender),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the login code sender.
    pub fn with_sender(mut self, sender: Arc<dyn CodeSender>) -> Self {
        self.sender = sender;
        self
    }

    /// Default region for phone numbers without a country code.
    pub fn region(&self) -> &str {
        &self.config.sms.default_country
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::crypto::test_key_manager;

    /// State over a fresh store in a temp dir. Keep the dir alive for the
    /// duration of the test.
    pub(crate) fn test_state(config: Config) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_or_create(&dir.path().join("vault.redb")).unwrap();
        (AppState::new(store, test_key_manager(), config), dir)
    }
}
