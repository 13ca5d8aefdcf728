// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Payment processor webhook receiver.
//!
//! The handler takes the raw request body; the HMAC covers the exact bytes
//! on the wire, so the payload must not pass through JSON extraction first.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::providers::verify_webhook_signature;
use crate::state::AppState;

/// Header carrying the webhook timestamp and HMAC.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Acknowledgement returned to the processor.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

/// Receive a payment event from the processor.
///
/// Deliveries are retried by the processor until acknowledged, so known
/// no-op conditions (duplicates, unknown intents, unhandled event types)
/// are acknowledged rather than errored.
#[utoipa::path(
    post,
    path = "/v1/webhooks/payments",
    tag = "Webhooks",
    request_body(content = String, description = "Raw webhook payload"),
    responses(
        (status = 200, description = "Event processed or ignored", body = WebhookAck),
        (status = 400, description = "Missing, malformed or invalid signature")
    )
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>), ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("Missing signature header"))?;

    let event = verify_webhook_signature(
        &state.webhook_secret,
        &body,
        signature,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        warn!(error = %e, "webhook rejected");
        ApiError::bad_request("Invalid webhook signature")
    })?;

    state.deposits.apply_event(event).await?;
    Ok((StatusCode::OK, Json(WebhookAck { received: true })))
}
