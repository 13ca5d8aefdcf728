// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Swap endpoint: convert fiat balance into the settlement asset.

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::error::{ApiError, ServiceError};
use crate::state::AppState;
use crate::swap::SwapResult;

/// Request body for executing a swap.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SwapRequest {
    /// Fiat amount to convert, in USD, at most 2 decimal places.
    pub amount: Decimal,
}

/// Execute a swap from the caller's fiat balance.
#[utoipa::path(
    post,
    path = "/v1/swap",
    tag = "Swap",
    security(("bearer_auth" = [])),
    request_body = SwapRequest,
    responses(
        (status = 200, description = "Swap executed", body = SwapResult),
        (status = 400, description = "Invalid amount"),
        (status = 401, description = "Not authenticated"),
        (status = 422, description = "Insufficient balance"),
        (status = 503, description = "Price feed or chain unavailable")
    )
)]
pub async fn execute_swap(
    Auth(wallet): Auth,
    State(state): State<AppState>,
    Json(request): Json<SwapRequest>,
) -> Result<Json<SwapResult>, ApiError> {
    let user = state
        .ledger
        .get_or_create_user(&wallet)
        .map_err(ServiceError::from)?;

    let result = state.swaps.execute(user.id, request.amount).await?;
    Ok(Json(result))
}
