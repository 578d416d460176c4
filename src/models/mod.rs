// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod ledger;
pub mod settings;

pub use ledger::{
    ApplyOutcome, Ledger, LeaderboardEntry, ParticipantRecord, ProcessedFileSummary, Statistics,
};
pub use settings::{ScoringSettings, Weights};
