// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Deposit endpoints: create, confirm and list card deposits.

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Auth;
use crate::deposit::DepositConfirmation;
use crate::error::{ApiError, ServiceError};
use crate::ledger::StoredDeposit;
use crate::state::AppState;

const DEFAULT_CURRENCY: &str = "USD";

/// Request body for creating a deposit.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDepositRequest {
    /// Amount in major units, at most 2 decimal places.
    pub amount: Decimal,
    /// ISO currency code. Defaults to USD.
    #[serde(default)]
    pub currency: Option<String>,
    /// Free-form metadata echoed back on the deposit.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Request body for confirming a deposit.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmDepositRequest {
    pub payment_intent_id: String,
    /// Processor reference of the payment method charged.
    pub payment_method_ref: String,
}

/// List response for deposits.
#[derive(Debug, Serialize, ToSchema)]
pub struct DepositListResponse {
    pub deposits: Vec<StoredDeposit>,
    pub total: usize,
}

/// Create a deposit backed by a processor payment intent.
#[utoipa::path(
    post,
    path = "/v1/deposits",
    tag = "Deposits",
    security(("bearer_auth" = [])),
    request_body = CreateDepositRequest,
    responses(
        (status = 201, description = "Deposit created", body = StoredDeposit),
        (status = 400, description = "Invalid amount or currency"),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Payment processor unavailable")
    )
)]
pub async fn create_deposit(
    Auth(wallet): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateDepositRequest>,
) -> Result<(StatusCode, Json<StoredDeposit>), ApiError> {
    let user = state
        .ledger
        .get_or_create_user(&wallet)
        .map_err(ServiceError::from)?;

    let currency = request.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
    let deposit = state
        .deposits
        .create(user.id, request.amount, currency, request.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(deposit)))
}

/// Confirm a pending deposit with the processor.
#[utoipa::path(
    post,
    path = "/v1/deposits/confirm",
    tag = "Deposits",
    security(("bearer_auth" = [])),
    request_body = ConfirmDepositRequest,
    responses(
        (status = 200, description = "Deposit state after confirmation", body = DepositConfirmation),
        (status = 400, description = "Missing payment method reference"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Deposit belongs to another user"),
        (status = 404, description = "Unknown payment intent"),
        (status = 409, description = "Deposit already settled"),
        (status = 503, description = "Payment still processing upstream")
    )
)]
pub async fn confirm_deposit(
    Auth(wallet): Auth,
    State(state): State<AppState>,
    Json(request): Json<ConfirmDepositRequest>,
) -> Result<Json<DepositConfirmation>, ApiError> {
    let user = state
        .ledger
        .get_or_create_user(&wallet)
        .map_err(ServiceError::from)?;

    let confirmation = state
        .deposits
        .confirm(
            user.id,
            &request.payment_intent_id,
            &request.payment_method_ref,
        )
        .await?;
    Ok(Json(confirmation))
}

/// List the caller's deposits, newest first.
#[utoipa::path(
    get,
    path = "/v1/deposits",
    tag = "Deposits",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Deposits", body = DepositListResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_deposits(
    Auth(wallet): Auth,
    State(state): State<AppState>,
) -> Result<Json<DepositListResponse>, ApiError> {
    let user = state
        .ledger
        .get_or_create_user(&wallet)
        .map_err(ServiceError::from)?;

    let deposits = state.deposits.list(user.id)?;
    Ok(Json(DepositListResponse {
        total: deposits.len(),
        deposits,
    }))
}
