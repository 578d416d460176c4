// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token middleware.
//!
//! A session is identified by a signed HS256 token whose subject is the
//! session id. Browsers carry it in the `checkin_session` cookie; scripts
//! may send it as a bearer token instead.

use crate::error::AppError;
use crate::store::SessionStore;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Cookie holding the session token.
pub const SESSION_COOKIE: &str = "checkin_session";

/// Session token claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Session id
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Session resolved from the request token.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub session_id: String,
}

/// Middleware that requires a valid session token.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Try cookie first, then header
    let token = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string)
            .ok_or(AppError::Unauthorized)?,
    };

    let session_id = verify_session_token(&token, &state.config.session_signing_key)
        .ok_or(AppError::InvalidToken)?;

    request.extensions_mut().insert(SessionUser { session_id });
    Ok(next.run(request).await)
}

/// Check a token's signature and expiry; returns the session id.
pub fn verify_session_token(token: &str, signing_key: &[u8]) -> Option<String> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).ok()?;
    let session_id = token_data.claims.sub;

    SessionStore::is_valid_session_id(&session_id).then_some(session_id)
}

/// Create a token for a session.
pub fn create_session_token(
    session_id: &str,
    signing_key: &[u8],
    max_age: Duration,
) -> anyhow::Result<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: session_id.to_string(),
        iat: now,
        exp: now + max_age.as_secs() as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// `Set-Cookie` value for a session token.
///
/// `Secure` is set unless the frontend is served from localhost.
pub fn session_cookie(token: &str, max_age: Duration, frontend_url: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        max_age.as_secs()
    );
    if !is_local_origin(frontend_url) {
        cookie.push_str("; Secure");
    }
    cookie
}

fn is_local_origin(url: &str) -> bool {
    url.starts_with("http://localhost") || url.starts_with("http://127.0.0.1")
}
