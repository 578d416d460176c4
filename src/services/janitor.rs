// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Removes expired session ledgers and backups.

use std::time::Duration;

use crate::store::SessionStore;

#[derive(Clone)]
pub struct Janitor {
    store: SessionStore,
    max_age: Duration,
    interval: Duration,
}

impl Janitor {
    pub fn new(store: SessionStore, max_age: Duration, interval: Duration) -> Self {
        Self {
            store,
            max_age,
            interval,
        }
    }

    /// Run one cleanup pass. Errors are logged, not returned.
    pub async fn run_once(&self) -> usize {
        match self.store.cleanup_expired(self.max_age).await {
            Ok(0) => 0,
            Ok(removed) => {
                tracing::info!(removed, "Expired session files cleaned up");
                removed
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session cleanup failed");
                0
            }
        }
    }

    /// Run a cleanup pass in the background without waiting for it.
    pub fn trigger(&self) {
        let janitor = self.clone();
        tokio::spawn(async move {
            janitor.run_once().await;
        });
    }

    /// Start the periodic cleanup task.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            "Session janitor started"
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            loop {
                interval.tick().await;
                self.run_once().await;
            }
        })
    }
}
