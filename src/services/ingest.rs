// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Batch upload processing.
//!
//! Handles the core workflow:
//! 1. Extract rosters from every uploaded workbook
//! 2. Decide per file: new, changed (weight or scoring settings) or unchanged
//! 3. Apply new and changed files to the session ledger
//! 4. Save the ledger once and report per-file outcomes

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

use crate::error::{AppError, Result};
use crate::models::settings::{MAX_WEIGHT, MIN_WEIGHT};
use crate::models::{Ledger, ScoringSettings, Weights};
use crate::services::roster::{self, Roster, RosterError, SheetInfo};
use crate::store::SessionStore;
use crate::time_utils::now_rfc3339;

const WEIGHT_EPSILON: f64 = 1e-9;

/// One uploaded workbook.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Options sent alongside an upload batch.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct IngestRequest {
    /// Weight per file name. Files without an entry use their historical
    /// weight, or 1 when new.
    #[serde(default)]
    #[validate(custom(function = "validate_weights"))]
    pub weights: HashMap<String, u32>,
    #[serde(default)]
    #[validate(nested)]
    pub settings: ScoringSettings,
}

fn validate_weights(weights: &HashMap<String, u32>) -> std::result::Result<(), ValidationError> {
    if weights
        .values()
        .all(|w| (MIN_WEIGHT..=MAX_WEIGHT).contains(w))
    {
        Ok(())
    } else {
        Err(ValidationError::new("weight_out_of_range"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// First time this file was applied
    New,
    /// Re-applied because its weight or scoring settings changed
    Updated,
    /// Already applied with the same weight and settings
    Skipped,
    /// Unsupported or unreadable
    Failed,
    /// Readable, but no nicknames in it
    Empty,
}

/// What happened to one uploaded file.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FileOutcome {
    pub file_name: String,
    pub status: FileStatus,
    pub weight: u32,
    pub nicknames: Vec<String>,
    pub rewarded: Vec<String>,
    /// Points for a regular check-in (base score × weight)
    pub points_per_person: f64,
    /// Points for a rewarded check-in, when anyone was rewarded
    pub reward_points_per_person: Option<f64>,
    pub total_points: f64,
    /// Descriptions of what changed since the file was last applied
    pub changes: Vec<String>,
    pub error: Option<String>,
}

impl FileOutcome {
    fn new(file_name: &str, status: FileStatus, weight: u32) -> Self {
        Self {
            file_name: file_name.to_string(),
            status,
            weight,
            nicknames: Vec::new(),
            rewarded: Vec::new(),
            points_per_person: 0.0,
            reward_points_per_person: None,
            total_points: 0.0,
            changes: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct IngestSummary {
    pub new_files: u32,
    pub updated_files: u32,
    pub skipped_files: u32,
    pub failed_files: u32,
    pub empty_files: u32,
    pub total_nicknames: u32,
    /// Σ nicknames × weight over applied files
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_weighted_points: u64,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
    pub summary: IngestSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum PreviewStatus {
    New,
    Processed,
}

/// Pre-processing view of an uploaded file.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UploadPreview {
    pub index: u32,
    pub file_name: String,
    pub size_kb: f64,
    pub status: PreviewStatus,
    /// Historical weight for processed files, 1 for new ones
    pub default_weight: u32,
    pub sheet: Option<SheetInfo>,
    pub error: Option<String>,
}

/// Applies upload batches to session ledgers.
#[derive(Clone)]
pub struct IngestService {
    store: SessionStore,
}

impl IngestService {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    /// Describe uploads before processing them.
    pub async fn preview(&self, session_id: &str, uploads: Vec<Upload>) -> Result<Vec<UploadPreview>> {
        let ledger = self.store.load(session_id).await?;

        let inspected = tokio::task::spawn_blocking(move || {
            uploads
                .into_iter()
                .map(|u| {
                    let info = roster::inspect(&u.bytes, &u.file_name);
                    (u.file_name, u.bytes.len(), info)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Preview task failed: {}", e)))?;

        Ok(inspected
            .into_iter()
            .enumerate()
            .map(|(i, (file_name, size, info))| {
                let (status, default_weight) = match ledger.processed_file(&file_name) {
                    Some(file) => (PreviewStatus::Processed, historical_weight(file.weight)),
                    None => (PreviewStatus::New, MIN_WEIGHT),
                };
                let (sheet, error) = match info {
                    Ok(sheet) => (Some(sheet), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                UploadPreview {
                    index: i as u32 + 1,
                    file_name,
                    size_kb: (size as f64 / 1024.0 * 10.0).round() / 10.0,
                    status,
                    default_weight,
                    sheet,
                    error,
                }
            })
            .collect())
    }

    /// Process an upload batch against a session's ledger.
    pub async fn process(
        &self,
        session_id: &str,
        uploads: Vec<Upload>,
        request: IngestRequest,
    ) -> Result<IngestReport> {
        request
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        tracing::info!(
            session_id,
            files = uploads.len(),
            reward_count = request.settings.reward_count,
            "Processing upload batch"
        );

        let extracted = tokio::task::spawn_blocking(move || {
            uploads
                .into_iter()
                .map(|u| {
                    let roster = roster::extract(&u.bytes, &u.file_name);
                    (u.file_name, roster)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Extraction task failed: {}", e)))?;

        let _guard = self.store.lock(session_id).await;
        let mut ledger = self.store.load(session_id).await?;
        let report = apply_batch(&mut ledger, extracted, &request, &now_rfc3339())?;

        if report.summary.new_files > 0 || report.summary.updated_files > 0 {
            self.store.save(session_id, &mut ledger).await?;
        }

        tracing::info!(
            session_id,
            new = report.summary.new_files,
            updated = report.summary.updated_files,
            skipped = report.summary.skipped_files,
            failed = report.summary.failed_files,
            nicknames = report.summary.total_nicknames,
            "Upload batch processed"
        );
        Ok(report)
    }
}

fn historical_weight(weight: f64) -> u32 {
    (weight.round() as u32).clamp(MIN_WEIGHT, MAX_WEIGHT)
}

fn settings_changed(old: &ScoringSettings, new: &ScoringSettings) -> bool {
    // The multiplier only matters while rewards are enabled.
    old.base_score != new.base_score
        || old.reward_count != new.reward_count
        || (new.reward_count > 0 && old.reward_multiplier != new.reward_multiplier)
}

/// Apply extracted rosters to a ledger in upload order.
pub fn apply_batch(
    ledger: &mut Ledger,
    extracted: Vec<(String, std::result::Result<Roster, RosterError>)>,
    request: &IngestRequest,
    now: &str,
) -> Result<IngestReport> {
    let settings = &request.settings;
    let mut files = Vec::with_capacity(extracted.len());
    let mut summary = IngestSummary::default();

    for (file_name, roster) in extracted {
        let history = ledger.processed_file(&file_name).cloned();
        let requested = request.weights.get(&file_name).copied();
        let weight = requested
            .or_else(|| history.as_ref().map(|h| historical_weight(h.weight)))
            .unwrap_or(MIN_WEIGHT);

        let mut changes = Vec::new();
        let mut reward_changed = false;
        if let Some(history) = &history {
            // Without a requested weight the stored one stands, even when it
            // is a fractional per-entry average.
            if let Some(requested) = requested {
                if (f64::from(requested) - history.weight).abs() > WEIGHT_EPSILON {
                    changes.push(format!("weight: {} → {}", history.weight, requested));
                }
            }
            let old_settings = history.settings();
            if settings_changed(&old_settings, settings) {
                reward_changed = true;
                changes.push(format!(
                    "scoring: {} → {}",
                    old_settings.describe(),
                    settings.describe()
                ));
            }
            if changes.is_empty() {
                tracing::debug!(file = %file_name, "Unchanged file skipped");
                summary.skipped_files += 1;
                files.push(FileOutcome::new(&file_name, FileStatus::Skipped, weight));
                continue;
            }
        }

        let roster = match roster {
            Ok(roster) => roster,
            Err(e) => {
                tracing::warn!(file = %file_name, error = %e, "Upload rejected");
                summary.failed_files += 1;
                let mut outcome = FileOutcome::new(&file_name, FileStatus::Failed, weight);
                outcome.error = Some(e.to_string());
                outcome.changes = changes;
                files.push(outcome);
                continue;
            }
        };

        if roster.nicknames.is_empty() {
            summary.empty_files += 1;
            files.push(FileOutcome::new(&file_name, FileStatus::Empty, weight));
            continue;
        }

        let (applied, effective) = match &history {
            Some(history) if !reward_changed => (
                ledger.reweight_file(&file_name, &roster.nicknames, &roster.times, weight, now)?,
                history.settings(),
            ),
            _ => {
                let weights = match (&history, requested) {
                    (Some(history), None) if history.weights.len() == roster.nicknames.len() => {
                        Weights::PerEntry(history.weights.clone())
                    }
                    _ => Weights::Uniform(weight),
                };
                (
                    ledger.apply_file(
                        &file_name,
                        &roster.nicknames,
                        &roster.times,
                        &weights,
                        settings,
                        now,
                    )?,
                    *settings,
                )
            }
        };

        let status = if history.is_some() {
            summary.updated_files += 1;
            FileStatus::Updated
        } else {
            summary.new_files += 1;
            FileStatus::New
        };
        summary.total_nicknames += applied.credited;
        summary.total_weighted_points += u64::from(applied.credited) * u64::from(weight);

        let points_per_person = effective.base_score * f64::from(weight);
        files.push(FileOutcome {
            file_name,
            status,
            weight,
            nicknames: roster.nicknames,
            reward_points_per_person: (!applied.rewarded.is_empty())
                .then(|| points_per_person * effective.reward_multiplier),
            rewarded: applied.rewarded,
            points_per_person,
            total_points: applied.total_points,
            changes,
            error: None,
        });
    }

    Ok(IngestReport { files, summary })
}
