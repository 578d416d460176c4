// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session creation and lookup.

use crate::error::Result;
use crate::middleware::session::{create_session_token, session_cookie, SessionUser};
use crate::models::Statistics;
use crate::store::SessionStore;
use crate::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Session creation (no session required).
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/session", post(create_session))
}

/// Session lookup (session required).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/session", get(get_session))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub token: String,
}

/// Start a new session with an empty ledger.
///
/// Also kicks off a background sweep of expired sessions.
async fn create_session(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let session_id = SessionStore::generate_session_id();
    state.store.open(&session_id).await?;

    let max_age = state.config.session_max_age;
    let token = create_session_token(&session_id, &state.config.session_signing_key, max_age)?;
    let cookie = session_cookie(&token, max_age, &state.config.frontend_url);

    state.janitor.trigger();
    tracing::info!(session_id = %session_id, "Session created");

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(CreateSessionResponse { session_id, token }),
    ))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionResponse {
    pub session_id: String,
    pub statistics: Statistics,
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionUser>,
) -> Result<Json<SessionResponse>> {
    let ledger = state.store.load(&session.session_id).await?;
    Ok(Json(SessionResponse {
        statistics: ledger.statistics(),
        session_id: session.session_id,
    }))
}
