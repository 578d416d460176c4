// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Operator endpoints (admin bearer token).

use crate::error::Result;
use crate::store::SessionInfo;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

/// Admin routes. The admin guard is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/admin/sessions", get(list_sessions))
}

/// Stored sessions, most recently modified first.
async fn list_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Vec<SessionInfo>>> {
    let sessions = state.store.active_sessions().await?;
    tracing::info!(count = sessions.len(), "Listed active sessions");
    Ok(Json(sessions))
}
