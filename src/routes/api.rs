// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for a session's ledger.

use crate::error::{AppError, Result};
use crate::middleware::SessionUser;
use crate::models::{Ledger, LeaderboardEntry, ProcessedFileSummary, Statistics};
use crate::services::{IngestReport, IngestRequest, Upload, UploadPreview};
use crate::time_utils::file_stamp;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Multipart field carrying workbooks.
const FILES_FIELD: &str = "files";
/// Multipart field carrying the JSON processing options.
const OPTIONS_FIELD: &str = "options";

/// UTF-8 byte order mark, so spreadsheet apps detect the CSV encoding.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// API routes (require a session).
/// The session middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/leaderboard.csv", get(get_leaderboard_csv))
        .route("/api/stats", get(get_stats))
        .route("/api/files", get(get_files))
        .route("/api/uploads/preview", post(preview_uploads))
        .route("/api/uploads", post(process_uploads))
        .route("/api/data", delete(clear_data))
        .route("/api/export", get(export_ledger))
        .route("/api/import", post(import_ledger))
}

// ─── Leaderboard & Statistics ────────────────────────────────

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let ledger = state.store.load(&session.session_id).await?;
    Ok(Json(ledger.leaderboard()))
}

/// Leaderboard as a CSV download.
async fn get_leaderboard_csv(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
) -> Result<impl IntoResponse> {
    let ledger = state.store.load(&session.session_id).await?;
    let body = leaderboard_csv(&ledger.leaderboard())?;
    let file_name = format!("leaderboard_{}.csv", file_stamp(chrono::Utc::now()));

    Ok(attachment("text/csv; charset=utf-8", &file_name, body))
}

fn leaderboard_csv(rows: &[LeaderboardEntry]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    if rows.is_empty() {
        writer.write_record(["rank", "nickname", "score", "participation_count"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to finish CSV: {}", e))
}

async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
) -> Result<Json<Statistics>> {
    let ledger = state.store.load(&session.session_id).await?;
    Ok(Json(ledger.statistics()))
}

/// Processed files, newest first.
async fn get_files(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
) -> Result<Json<Vec<ProcessedFileSummary>>> {
    let ledger = state.store.load(&session.session_id).await?;
    Ok(Json(ledger.processed_files()))
}

// ─── Uploads ─────────────────────────────────────────────────

/// Describe uploaded workbooks without changing the ledger.
async fn preview_uploads(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
    multipart: Multipart,
) -> Result<Json<Vec<UploadPreview>>> {
    let (uploads, _) = read_upload_form(multipart).await?;
    let previews = state.ingest.preview(&session.session_id, uploads).await?;
    Ok(Json(previews))
}

/// Apply uploaded workbooks to the ledger.
async fn process_uploads(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
    multipart: Multipart,
) -> Result<Json<IngestReport>> {
    let (uploads, options) = read_upload_form(multipart).await?;
    let request = match options {
        Some(raw) => serde_json::from_str::<IngestRequest>(&raw)
            .map_err(|e| AppError::BadRequest(format!("Invalid options: {}", e)))?,
        None => IngestRequest::default(),
    };

    let report = state
        .ingest
        .process(&session.session_id, uploads, request)
        .await?;
    Ok(Json(report))
}

/// Collect `files` parts and the optional `options` part.
async fn read_upload_form(mut multipart: Multipart) -> Result<(Vec<Upload>, Option<String>)> {
    let mut uploads = Vec::new();
    let mut options = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some(FILES_FIELD) => {
                let file_name = field
                    .file_name()
                    .map(base_name)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| AppError::BadRequest("Uploaded file has no name".into()))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                uploads.push(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            Some(OPTIONS_FIELD) => {
                options = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?,
                );
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    if uploads.is_empty() {
        return Err(AppError::BadRequest("No files uploaded".into()));
    }
    Ok((uploads, options))
}

/// Strip any client-side directory from an uploaded file name.
fn base_name(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    name.trim().to_string()
}

// ─── Data Management ─────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClearResponse {
    pub success: bool,
    pub backup_file: String,
}

/// Back up, then empty the session's ledger.
async fn clear_data(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
) -> Result<Json<ClearResponse>> {
    let backup = state.store.clear(&session.session_id).await?;
    Ok(Json(ClearResponse {
        success: true,
        backup_file: display_name(&backup),
    }))
}

/// Ledger as a JSON download.
async fn export_ledger(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
) -> Result<impl IntoResponse> {
    let body = state.store.export(&session.session_id).await?;
    let file_name = format!("checkin_records_{}.json", file_stamp(chrono::Utc::now()));

    Ok(attachment("application/json", &file_name, body))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ImportResponse {
    pub success: bool,
    pub backup_file: String,
    pub participants: u32,
    pub files: u32,
}

/// Replace the ledger with an uploaded export. The current ledger is backed
/// up first and left untouched when the document is invalid.
async fn import_ledger(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
    body: Bytes,
) -> Result<Json<ImportResponse>> {
    let ledger = Ledger::parse_document(&body)?;
    let participants = ledger.records.len() as u32;
    let files = ledger.processed_files.len() as u32;

    let backup = state.store.import(&session.session_id, ledger).await?;
    Ok(Json(ImportResponse {
        success: true,
        backup_file: display_name(&backup),
        participants,
        files,
    }))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn attachment(content_type: &'static str, file_name: &str, body: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
}
