// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod ingest;
pub mod janitor;
pub mod roster;

pub use ingest::{IngestReport, IngestRequest, IngestService, Upload, UploadPreview};
pub use janitor::Janitor;
pub use roster::{Roster, RosterError, SheetInfo};
