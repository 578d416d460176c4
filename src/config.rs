// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local runs.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_MAX_AGE_HOURS: u64 = 24;
const DEFAULT_CLEANUP_INTERVAL_MINUTES: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Directory holding per-session ledger files and backups
    pub data_dir: PathBuf,
    /// Frontend origin allowed by CORS
    pub frontend_url: String,
    /// HMAC key for session tokens (raw bytes)
    pub session_signing_key: Vec<u8>,
    /// Ledgers untouched for longer than this are removed
    pub session_max_age: Duration,
    /// How often the janitor sweeps the data directory
    pub cleanup_interval: Duration,
    /// Request body limit for uploads
    pub max_upload_bytes: usize,
    /// Bearer token for the admin endpoints; admin routes are hidden when unset
    pub admin_token: Option<String>,
}

impl Config {
    /// Config for tests. Never use in production.
    pub fn test_default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: PathBuf::from("data"),
            frontend_url: "http://localhost:5173".to_string(),
            session_signing_key: b"test_session_key_at_least_32_bytes!".to_vec(),
            session_max_age: Duration::from_secs(DEFAULT_SESSION_MAX_AGE_HOURS * 3600),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_MINUTES * 60),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            admin_token: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let session_signing_key = env::var("SESSION_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("SESSION_SIGNING_KEY"))?
            .trim()
            .to_string()
            .into_bytes();
        if session_signing_key.len() < 32 {
            return Err(ConfigError::Invalid(
                "SESSION_SIGNING_KEY",
                "must be at least 32 bytes".to_string(),
            ));
        }

        let session_max_age_hours =
            parse_var("SESSION_MAX_AGE_HOURS", DEFAULT_SESSION_MAX_AGE_HOURS)?;
        let cleanup_interval_minutes =
            parse_var("CLEANUP_INTERVAL_MINUTES", DEFAULT_CLEANUP_INTERVAL_MINUTES)?;
        if cleanup_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "CLEANUP_INTERVAL_MINUTES",
                "must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            port: parse_var("PORT", DEFAULT_PORT)?,
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            session_signing_key,
            session_max_age: Duration::from_secs(session_max_age_hours * 3600),
            cleanup_interval: Duration::from_secs(cleanup_interval_minutes * 60),
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            admin_token: env::var("ADMIN_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

/// Parse an optional numeric environment variable, falling back to `default`.
fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(name, e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global; keep every env mutation in this one test.
    #[test]
    fn test_config_from_env() {
        env::set_var("SESSION_SIGNING_KEY", "test_session_key_at_least_32_bytes!");
        env::set_var("DATA_DIR", "/tmp/checkin-data");
        env::set_var("SESSION_MAX_AGE_HOURS", "48");
        env::remove_var("PORT");
        env::remove_var("ADMIN_TOKEN");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.port, 8080);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/checkin-data"));
        assert_eq!(config.session_max_age, Duration::from_secs(48 * 3600));
        assert!(config.admin_token.is_none());

        env::set_var("SESSION_MAX_AGE_HOURS", "forever");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("SESSION_MAX_AGE_HOURS", _)));

        env::set_var("SESSION_MAX_AGE_HOURS", "24");
        env::set_var("SESSION_SIGNING_KEY", "short");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("SESSION_SIGNING_KEY", _)));
    }
}
