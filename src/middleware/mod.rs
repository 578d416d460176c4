// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (sessions, admin guard, security headers).

pub mod admin;
pub mod security;
pub mod session;

pub use admin::require_admin;
pub use session::{require_session, SessionUser};
