// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scoring settings and per-file weights.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::models::ledger::LedgerError;

pub const MIN_WEIGHT: u32 = 1;
pub const MAX_WEIGHT: u32 = 100;

/// How points are computed for one file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ScoringSettings {
    /// Points per check-in before weight and reward
    #[validate(range(min = 0.1, max = 100.0))]
    #[serde(default = "default_base_score")]
    pub base_score: f64,
    /// Number of earliest submitters who get the reward multiplier (0 disables)
    #[validate(range(max = 100))]
    #[serde(default)]
    pub reward_count: u32,
    /// Multiplier applied to rewarded submitters
    #[validate(range(min = 1.0, max = 10.0))]
    #[serde(default = "default_reward_multiplier")]
    pub reward_multiplier: f64,
}

fn default_base_score() -> f64 {
    1.0
}

fn default_reward_multiplier() -> f64 {
    1.5
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            base_score: default_base_score(),
            reward_count: 0,
            reward_multiplier: default_reward_multiplier(),
        }
    }
}

impl ScoringSettings {
    /// Human-readable form used in change descriptions ("1/3/1.5").
    pub fn describe(&self) -> String {
        format!(
            "{}/{}/{}",
            self.base_score, self.reward_count, self.reward_multiplier
        )
    }
}

/// Weight ("码数") applied to the check-ins of a file.
#[derive(Debug, Clone, PartialEq)]
pub enum Weights {
    /// Same weight for every nickname in the file.
    Uniform(u32),
    /// One weight per nickname, in nickname order.
    PerEntry(Vec<u32>),
}

impl Weights {
    /// Expand to one weight per nickname.
    pub fn expand(&self, count: usize) -> Result<Vec<u32>, LedgerError> {
        match self {
            Weights::Uniform(w) => Ok(vec![*w; count]),
            Weights::PerEntry(ws) if ws.len() == count => Ok(ws.clone()),
            Weights::PerEntry(ws) => Err(LedgerError::WeightCountMismatch {
                weights: ws.len(),
                nicknames: count,
            }),
        }
    }
}
