// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON file store with typed ledger operations.
//!
//! Each session owns `records_<session_id>.json` in the data directory.
//! Writes go to a temp file first and are renamed into place, and all
//! read-modify-write cycles for one session are serialized by a
//! per-session lock.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex, OwnedMutexGuard};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::Ledger;
use crate::store::{files, StoreError};
use crate::time_utils::{file_stamp, format_utc_rfc3339, now_rfc3339};

const MAX_SESSION_ID_LEN: usize = 64;

/// Summary of one stored session.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionInfo {
    pub session_id: String,
    pub last_modified: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub file_size: u64,
    pub file_path: String,
}

/// Per-session ledger storage.
#[derive(Clone)]
pub struct SessionStore {
    data_dir: PathBuf,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Generate a fresh session id: 8 hex chars of a v4 UUID plus Unix seconds.
    pub fn generate_session_id() -> String {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        format!("{}_{}", &uuid[..8], Utc::now().timestamp())
    }

    /// Session ids end up in file names, so only a safe alphabet is accepted.
    pub fn is_valid_session_id(session_id: &str) -> bool {
        !session_id.is_empty()
            && session_id.len() <= MAX_SESSION_ID_LEN
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    fn ledger_path(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        if !Self::is_valid_session_id(session_id) {
            return Err(StoreError::InvalidSessionId(session_id.to_string()));
        }
        Ok(self.data_dir.join(format!(
            "{}{}{}",
            files::RECORDS_PREFIX,
            session_id,
            files::EXTENSION
        )))
    }

    /// Acquire the per-session lock. Hold the guard across load → save.
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(session_id.to_string())
            .or_default()
            .clone();
        mutex.lock_owned().await
    }

    /// Make sure the ledger file exists, creating an empty one if needed.
    pub async fn open(&self, session_id: &str) -> Result<(), StoreError> {
        let path = self.ledger_path(session_id)?;
        tokio::fs::create_dir_all(&self.data_dir).await?;

        if tokio::fs::try_exists(&path).await? {
            return Ok(());
        }

        let mut ledger = Ledger::default();
        self.save(session_id, &mut ledger).await?;
        tracing::info!(session_id, "Created session ledger");
        Ok(())
    }

    /// Load a session's ledger. Missing or unreadable documents yield an
    /// empty ledger.
    pub async fn load(&self, session_id: &str) -> Result<Ledger, StoreError> {
        let path = self.ledger_path(session_id)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Ledger::default()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(ledger) => Ok(ledger),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Corrupt ledger file, starting empty");
                Ok(Ledger::default())
            }
        }
    }

    /// Persist a ledger, stamping `last_updated`.
    pub async fn save(&self, session_id: &str, ledger: &mut Ledger) -> Result<(), StoreError> {
        let path = self.ledger_path(session_id)?;
        ledger.last_updated = now_rfc3339();
        write_json_atomic(&path, ledger).await
    }

    /// Copy the current ledger to `backup_<session>_<stamp>.json`.
    pub async fn backup(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        let ledger = self.load(session_id).await?;
        let path = self.data_dir.join(format!(
            "{}{}_{}{}",
            files::BACKUP_PREFIX,
            session_id,
            file_stamp(Utc::now()),
            files::EXTENSION
        ));
        write_json_atomic(&path, &ledger).await?;

        tracing::info!(session_id, path = %path.display(), "Ledger backed up");
        Ok(path)
    }

    /// Ledger as a downloadable JSON document, tagged with the export time
    /// and session id.
    pub async fn export(&self, session_id: &str) -> Result<Vec<u8>, StoreError> {
        let ledger = self.load(session_id).await?;
        let mut document = serde_json::to_value(&ledger)?;
        if let Some(object) = document.as_object_mut() {
            object.insert("exported_at".to_string(), now_rfc3339().into());
            object.insert("session_id".to_string(), session_id.into());
        }
        Ok(serde_json::to_vec_pretty(&document)?)
    }

    /// Replace a session's ledger with an imported one. The current ledger
    /// is backed up first; the backup path is returned.
    pub async fn import(&self, session_id: &str, mut ledger: Ledger) -> Result<PathBuf, StoreError> {
        let _guard = self.lock(session_id).await;
        let backup = self.backup(session_id).await?;
        self.save(session_id, &mut ledger).await?;

        tracing::info!(
            session_id,
            participants = ledger.records.len(),
            files = ledger.processed_files.len(),
            "Ledger imported"
        );
        Ok(backup)
    }

    /// Back up, then empty a session's ledger.
    pub async fn clear(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        let _guard = self.lock(session_id).await;
        let backup = self.backup(session_id).await?;
        let mut ledger = self.load(session_id).await?;
        ledger.clear();
        self.save(session_id, &mut ledger).await?;

        tracing::info!(session_id, "Ledger cleared");
        Ok(backup)
    }

    /// Delete ledgers and backups not modified within `max_age`.
    ///
    /// Returns the number of files removed. Failures on individual files are
    /// logged and skipped.
    pub async fn cleanup_expired(&self, max_age: Duration) -> Result<usize, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let is_managed = (file_name.starts_with(files::RECORDS_PREFIX)
                || file_name.starts_with(files::BACKUP_PREFIX))
                && file_name.ends_with(files::EXTENSION);
            if !is_managed {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!(file = %file_name, error = %e, "Failed to stat session file");
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    removed += 1;
                    tracing::info!(file = %file_name, age_secs = age.as_secs(), "Removed expired session file");
                    if let Some(session_id) = records_session_id(&file_name) {
                        self.locks
                            .remove_if(session_id, |_, m| Arc::strong_count(m) == 1);
                    }
                }
                Err(e) => {
                    tracing::warn!(file = %file_name, error = %e, "Failed to remove expired session file");
                }
            }
        }

        Ok(removed)
    }

    /// Stored sessions, most recently modified first.
    pub async fn active_sessions(&self) -> Result<Vec<SessionInfo>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(session_id) = records_session_id(&file_name) else {
                continue;
            };

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(file = %file_name, error = %e, "Failed to read session info");
                    continue;
                }
            };
            let last_modified = metadata
                .modified()
                .map(|m| format_utc_rfc3339(DateTime::<Utc>::from(m)))
                .unwrap_or_default();

            sessions.push(SessionInfo {
                session_id: session_id.to_string(),
                last_modified,
                file_size: metadata.len(),
                file_path: entry.path().display().to_string(),
            });
        }

        sessions.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(sessions)
    }
}

/// Session id of a `records_<id>.json` file name.
fn records_session_id(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(files::RECORDS_PREFIX)?
        .strip_suffix(files::EXTENSION)
        .filter(|id| !id.is_empty())
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &bytes).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
