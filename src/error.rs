// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Error taxonomy and HTTP mapping.
//!
//! Workflows return [`ServiceError`]; handlers convert it into [`ApiError`]
//! at the boundary. Internal errors are logged with full detail and surfaced
//! to the caller with a generic message only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Categorized failure returned by workflows and the ledger.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed input. Raised before any store access.
    #[error("{0}")]
    Validation(String),

    /// Referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Credentials missing, expired or invalid.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller is not the owner of the resource.
    #[error("{0}")]
    Forbidden(String),

    /// Idempotency or uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    /// Business-rule violation: requested amount exceeds the balance.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Payment processor, blockchain RPC or price feed failure/timeout.
    /// Retryable from the caller's perspective.
    #[error("{0}")]
    ExternalService(String),

    /// Anything uncategorized. Detail stays in the logs.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(detail = %message, "internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred",
        )
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::bad_request(msg),
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Unauthorized(msg) => ApiError::unauthorized(msg),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::InsufficientFunds(msg) => {
                ApiError::unprocessable(format!("insufficient funds: {msg}"))
            }
            ServiceError::ExternalService(msg) => ApiError::service_unavailable(msg),
            ServiceError::Internal(msg) => ApiError::internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
