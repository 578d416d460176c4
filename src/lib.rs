// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkin-Tally: score participants from check-in spreadsheets
//!
//! This crate provides the backend API that reads uploaded check-in
//! workbooks, credits each nickname with weighted points and keeps a
//! per-session leaderboard.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod time_utils;

use config::Config;
use services::{IngestService, Janitor};
use store::SessionStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: SessionStore,
    pub ingest: IngestService,
    pub janitor: Janitor,
}

impl AppState {
    /// Wire the services for a configuration.
    pub fn new(config: Config) -> Self {
        let store = SessionStore::new(config.data_dir.clone());
        let ingest = IngestService::new(store.clone());
        let janitor = Janitor::new(
            store.clone(),
            config.session_max_age,
            config.cleanup_interval,
        );
        Self {
            config,
            store,
            ingest,
            janitor,
        }
    }
}
