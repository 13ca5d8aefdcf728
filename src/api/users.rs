// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Profile and wallet endpoints for the authenticated user.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::Auth;
use crate::blockchain::{TokenBalance, TokenTransfer};
use crate::error::{ApiError, ServiceError};
use crate::ledger::StoredUser;
use crate::state::AppState;

const MAX_DISPLAY_NAME_LEN: usize = 64;

/// Profile returned to the authenticated user.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: u64,
    pub wallet_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Fiat balance in USD.
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredUser> for UserResponse {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            wallet_address: user.wallet_address,
            display_name: user.display_name,
            balance: user.balance,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Request body for profile updates.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub display_name: String,
}

/// Combined on-chain balances for the user's wallet.
#[derive(Debug, Serialize, ToSchema)]
pub struct OnchainBalanceResponse {
    pub address: String,
    pub native: TokenBalance,
    pub token: TokenBalance,
}

/// Query params for the token transfer listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TokenTransferQuery {
    /// Earliest block to scan from.
    pub from_block: Option<u64>,
}

/// List response for token transfers.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenTransferListResponse {
    pub transfers: Vec<TokenTransfer>,
    pub total: usize,
}

/// Fetch the caller's profile, creating the account on first touch.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller profile", body = UserResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(
    Auth(wallet): Auth,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .ledger
        .get_or_create_user(&wallet)
        .map_err(ServiceError::from)?;
    Ok(Json(user.into()))
}

/// Update the caller's display name.
#[utoipa::path(
    patch,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "Invalid display name"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_me(
    Auth(wallet): Auth,
    State(state): State<AppState>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let name = request.display_name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("display_name must not be empty"));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "display_name must be at most {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }

    let user = state
        .ledger
        .get_or_create_user(&wallet)
        .map_err(ServiceError::from)?;
    let updated = state
        .ledger
        .set_display_name(user.id, name)
        .map_err(ServiceError::from)?;
    Ok(Json(updated.into()))
}

/// Native and settlement-token balances of the caller's wallet.
#[utoipa::path(
    get,
    path = "/v1/users/me/onchain-balance",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "On-chain balances", body = OnchainBalanceResponse),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Chain RPC unavailable")
    )
)]
pub async fn onchain_balance(
    Auth(wallet): Auth,
    State(state): State<AppState>,
) -> Result<Json<OnchainBalanceResponse>, ApiError> {
    let native = state
        .chain
        .native_balance(wallet.as_str())
        .await
        .map_err(ServiceError::from)?;
    let token = state
        .chain
        .token_balance(wallet.as_str())
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(OnchainBalanceResponse {
        address: wallet.as_str().to_string(),
        native,
        token,
    }))
}

/// Historical settlement-token transfers touching the caller's wallet.
#[utoipa::path(
    get,
    path = "/v1/users/me/token-transfers",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(TokenTransferQuery),
    responses(
        (status = 200, description = "Transfers", body = TokenTransferListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Chain RPC unavailable")
    )
)]
pub async fn token_transfers(
    Auth(wallet): Auth,
    State(state): State<AppState>,
    Query(query): Query<TokenTransferQuery>,
) -> Result<Json<TokenTransferListResponse>, ApiError> {
    let transfers = state
        .chain
        .token_transfer_logs(wallet.as_str(), query.from_block)
        .await
        .map_err(ServiceError::from)?;

    Ok(Json(TokenTransferListResponse {
        total: transfers.len(),
        transfers,
    }))
}
