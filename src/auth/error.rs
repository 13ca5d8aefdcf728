// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Authentication errors.
//!
//! Every credential failure maps to the same 401 response body. The precise
//! reason is logged server-side only, so callers cannot distinguish a
//! missing header from an expired or forged token.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

#[derive(Debug)]
pub enum AuthError {
    /// No Authorization header present.
    MissingAuthHeader,
    /// Header present but not `Bearer <token>`.
    InvalidAuthHeader,
    /// Token structure could not be decoded.
    MalformedToken,
    /// Token signature does not match.
    InvalidSignature,
    /// Token has expired.
    TokenExpired,
    /// Token signing failed.
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
}

impl AuthError {
    fn reason(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Internal(msg) => write!(f, "internal authentication error: {msg}"),
            other => write!(f, "{}", other.reason()),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        warn!(reason = self.reason(), "authentication failed");
        let message = match self.status_code() {
            StatusCode::UNAUTHORIZED => "Authentication required",
            _ => "An internal error occurred",
        };
        let body = Json(AuthErrorBody {
            error: message.to_string(),
        });
        (self.status_code(), body).into_response()
    }
}
