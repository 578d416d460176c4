// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-session score ledger.
//!
//! The ledger is the JSON document stored for each session. It maps each
//! nickname to a running score plus the per-file entries that produced it,
//! and remembers every processed file together with the weight and scoring
//! settings used, so a file can be re-applied when those change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::settings::{ScoringSettings, Weights};

/// Ledger document, stored at `records_<session_id>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    /// Score record per nickname
    #[serde(default)]
    pub records: BTreeMap<String, ParticipantRecord>,
    /// Files applied to this ledger, keyed by file name
    #[serde(default)]
    pub processed_files: BTreeMap<String, ProcessedFile>,
    /// Last save timestamp (RFC 3339)
    #[serde(default)]
    pub last_updated: String,
    /// Number of distinct files applied
    #[serde(default)]
    pub total_files_processed: u64,
}

/// Running score of one nickname.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub score: f64,
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// Points one nickname earned from one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_name: String,
    pub date: String,
    pub weight: u32,
    #[serde(default = "default_one")]
    pub base_score: f64,
    pub points: f64,
    #[serde(default)]
    pub is_rewarded: bool,
}

/// Metadata kept for every applied file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub processed_date: String,
    pub nicknames_count: u32,
    /// Uniform weight, or the average when weights differ per nickname
    #[serde(default = "default_one")]
    pub weight: f64,
    #[serde(default)]
    pub weights: Vec<u32>,
    #[serde(default = "default_one")]
    pub base_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<f64>,
    #[serde(default)]
    pub reward_count: u32,
    #[serde(default = "default_one")]
    pub reward_multiplier: f64,
    #[serde(default)]
    pub rewarded_users: Vec<String>,
}

fn default_one() -> f64 {
    1.0
}

impl ProcessedFile {
    /// Scoring settings this file was last applied with.
    pub fn settings(&self) -> ScoringSettings {
        ScoringSettings {
            base_score: self.base_score,
            reward_count: self.reward_count,
            reward_multiplier: self.reward_multiplier,
        }
    }
}

/// Result of applying one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Nicknames credited (blank and repeated names are skipped)
    pub credited: u32,
    /// Rewarded nicknames, earliest submission first
    pub rewarded: Vec<String>,
    pub total_points: f64,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub nickname: String,
    pub score: f64,
    /// Number of files the nickname appears in
    pub participation_count: u32,
}

/// Ledger-wide statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Statistics {
    pub total_participants: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_files_processed: u64,
    pub last_updated: String,
    pub total_checkins: f64,
}

/// Processed file with legacy defaults filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProcessedFileSummary {
    pub file_name: String,
    pub processed_date: String,
    pub nicknames_count: u32,
    pub weight: f64,
    pub base_score: f64,
    pub total_points: f64,
    pub reward_count: u32,
    pub reward_multiplier: f64,
    pub rewarded_users: Vec<String>,
}

impl Ledger {
    /// Whether a file with this name has been applied.
    pub fn is_file_processed(&self, file_name: &str) -> bool {
        self.processed_files.contains_key(file_name)
    }

    pub fn processed_file(&self, file_name: &str) -> Option<&ProcessedFile> {
        self.processed_files.get(file_name)
    }

    /// Credit the nicknames of one file.
    ///
    /// `times` holds the submission time of each nickname (same order, may be
    /// shorter or blank). The earliest `reward_count` submitters get
    /// `reward_multiplier` times the normal points. Applying a file that is
    /// already in the ledger replaces its previous contribution.
    pub fn apply_file(
        &mut self,
        file_name: &str,
        nicknames: &[String],
        times: &[String],
        weights: &Weights,
        settings: &ScoringSettings,
        now: &str,
    ) -> Result<ApplyOutcome, LedgerError> {
        let weights_per_name = weights.expand(nicknames.len())?;
        let average_weight = if weights_per_name.is_empty() {
            1.0
        } else {
            weights_per_name.iter().map(|&w| f64::from(w)).sum::<f64>()
                / weights_per_name.len() as f64
        };
        let rewarded = select_rewarded(nicknames, times, settings.reward_count);

        if !self.retract_file(file_name) {
            self.total_files_processed += 1;
        }

        let mut credited = 0u32;
        let mut total_points = 0.0;
        let mut seen = std::collections::HashSet::new();

        for (raw, &weight) in nicknames.iter().zip(&weights_per_name) {
            let nickname = raw.trim();
            if nickname.is_empty() || !seen.insert(nickname) {
                continue;
            }

            let is_rewarded = rewarded.iter().any(|r| r == nickname);
            let mut points = settings.base_score * f64::from(weight);
            if is_rewarded {
                points *= settings.reward_multiplier;
            }

            let record = self.records.entry(nickname.to_string()).or_default();
            record.score += points;
            record.files.push(FileEntry {
                file_name: file_name.to_string(),
                date: now.to_string(),
                weight,
                base_score: settings.base_score,
                points,
                is_rewarded,
            });

            credited += 1;
            total_points += points;
        }

        self.processed_files.insert(
            file_name.to_string(),
            ProcessedFile {
                processed_date: now.to_string(),
                nicknames_count: credited,
                weight: match weights {
                    Weights::Uniform(w) => f64::from(*w),
                    Weights::PerEntry(_) => average_weight,
                },
                weights: weights_per_name,
                base_score: settings.base_score,
                total_points: Some(total_points),
                reward_count: settings.reward_count,
                reward_multiplier: settings.reward_multiplier,
                rewarded_users: rewarded.clone(),
            },
        );

        Ok(ApplyOutcome {
            credited,
            rewarded,
            total_points,
        })
    }

    /// Re-apply a processed file with a new uniform weight, keeping the
    /// scoring settings it was last applied with.
    pub fn reweight_file(
        &mut self,
        file_name: &str,
        nicknames: &[String],
        times: &[String],
        new_weight: u32,
        now: &str,
    ) -> Result<ApplyOutcome, LedgerError> {
        let settings = self
            .processed_file(file_name)
            .map(ProcessedFile::settings)
            .unwrap_or_default();
        self.apply_file(
            file_name,
            nicknames,
            times,
            &Weights::Uniform(new_weight),
            &settings,
            now,
        )
    }

    /// Remove everything a file contributed. Returns whether the file was
    /// recorded as processed.
    fn retract_file(&mut self, file_name: &str) -> bool {
        let was_processed = self.processed_files.remove(file_name).is_some();

        for record in self.records.values_mut() {
            if !record.files.iter().any(|f| f.file_name == file_name) {
                continue;
            }
            let retracted: f64 = record
                .files
                .iter()
                .filter(|f| f.file_name == file_name)
                .map(|f| f.points)
                .sum();
            record.files.retain(|f| f.file_name != file_name);
            record.score -= retracted;
        }
        self.records.retain(|_, r| !r.files.is_empty());

        was_processed
    }

    /// Scores in descending order; ties are broken by nickname.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut rows: Vec<(&String, &ParticipantRecord)> = self.records.iter().collect();
        rows.sort_by(|a, b| b.1.score.total_cmp(&a.1.score).then_with(|| a.0.cmp(b.0)));

        rows.into_iter()
            .enumerate()
            .map(|(i, (nickname, record))| LeaderboardEntry {
                rank: i as u32 + 1,
                nickname: nickname.clone(),
                score: record.score,
                participation_count: record.files.len() as u32,
            })
            .collect()
    }

    pub fn statistics(&self) -> Statistics {
        Statistics {
            total_participants: self.records.len() as u32,
            total_files_processed: self.total_files_processed,
            last_updated: self.last_updated.clone(),
            total_checkins: self.records.values().map(|r| r.score).sum(),
        }
    }

    /// Processed files, most recently processed first.
    pub fn processed_files(&self) -> Vec<ProcessedFileSummary> {
        let mut files: Vec<ProcessedFileSummary> = self
            .processed_files
            .iter()
            .map(|(name, info)| ProcessedFileSummary {
                file_name: name.clone(),
                processed_date: info.processed_date.clone(),
                nicknames_count: info.nicknames_count,
                weight: info.weight,
                base_score: info.base_score,
                total_points: info
                    .total_points
                    .unwrap_or_else(|| f64::from(info.nicknames_count)),
                reward_count: info.reward_count,
                reward_multiplier: info.reward_multiplier,
                rewarded_users: info.rewarded_users.clone(),
            })
            .collect();

        files.sort_by(|a, b| b.processed_date.cmp(&a.processed_date));
        files
    }

    /// Drop all records and processed files.
    pub fn clear(&mut self) {
        *self = Ledger {
            last_updated: std::mem::take(&mut self.last_updated),
            ..Default::default()
        };
    }

    /// Parse and validate a ledger document uploaded for import.
    ///
    /// `records`, `last_updated` and `total_files_processed` are required;
    /// extra fields such as `exported_at` are ignored.
    pub fn parse_document(bytes: &[u8]) -> Result<Ledger, LedgerError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| LedgerError::InvalidDocument(format!("not valid JSON: {}", e)))?;

        let object = value.as_object().ok_or_else(|| {
            LedgerError::InvalidDocument("top level must be an object".to_string())
        })?;

        let missing: Vec<&str> = ["records", "last_updated", "total_files_processed"]
            .into_iter()
            .filter(|field| !object.contains_key(*field))
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::InvalidDocument(format!(
                "missing fields: {}",
                missing.join(", ")
            )));
        }

        if !object["records"].is_object() {
            return Err(LedgerError::InvalidDocument(
                "'records' must be an object".to_string(),
            ));
        }
        if !object["total_files_processed"].is_u64() {
            return Err(LedgerError::InvalidDocument(
                "'total_files_processed' must be a non-negative integer".to_string(),
            ));
        }

        serde_json::from_value(value).map_err(|e| LedgerError::InvalidDocument(e.to_string()))
    }
}

/// Pick the earliest `reward_count` distinct submitters.
///
/// Times compare as strings; entries with a blank or `nan` time never win.
fn select_rewarded(nicknames: &[String], times: &[String], reward_count: u32) -> Vec<String> {
    if reward_count == 0 {
        return Vec::new();
    }

    let mut timed: Vec<(&str, &str)> = nicknames
        .iter()
        .zip(times)
        .map(|(n, t)| (n.trim(), t.trim()))
        .filter(|(n, t)| !n.is_empty() && !t.is_empty() && !t.eq_ignore_ascii_case("nan"))
        .collect();
    timed.sort_by(|a, b| a.1.cmp(b.1));

    let mut rewarded: Vec<String> = Vec::new();
    for (nickname, _) in timed {
        if rewarded.len() == reward_count as usize {
            break;
        }
        if !rewarded.iter().any(|r| r == nickname) {
            rewarded.push(nickname.to_string());
        }
    }
    rewarded
}

/// Errors from ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{weights} weights given for {nicknames} nicknames")]
    WeightCountMismatch { weights: usize, nicknames: usize },

    #[error("Invalid ledger document: {0}")]
    InvalidDocument(String),
}
