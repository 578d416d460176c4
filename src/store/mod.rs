// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer (one JSON ledger file per session).

pub mod json_store;

pub use json_store::{SessionInfo, SessionStore};

/// File naming inside the data directory.
pub mod files {
    pub const RECORDS_PREFIX: &str = "records_";
    pub const BACKUP_PREFIX: &str = "backup_";
    pub const EXTENSION: &str = ".json";
}

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
