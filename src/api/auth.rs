// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Authentication endpoints: nonce challenge and sign-in.

use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::{NonceChallenge, SessionToken};
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for the nonce challenge.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NonceRequest {
    /// EVM wallet address (`0x` + 40 hex characters).
    pub wallet_address: String,
}

/// Request body for sign-in.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SignInRequest {
    /// EVM wallet address (`0x` + 40 hex characters).
    pub wallet_address: String,
    /// EIP-191 signature over the challenge message (`0x` + 130 hex).
    pub signature: String,
}

/// Issue a single-use login challenge for a wallet.
#[utoipa::path(
    post,
    path = "/v1/auth/nonce",
    tag = "Auth",
    request_body = NonceRequest,
    responses(
        (status = 200, description = "Challenge issued", body = NonceChallenge),
        (status = 400, description = "Malformed wallet address")
    )
)]
pub async fn issue_nonce(
    State(state): State<AppState>,
    Json(request): Json<NonceRequest>,
) -> Result<Json<NonceChallenge>, ApiError> {
    let challenge = state.auth.issue_nonce(&request.wallet_address)?;
    Ok(Json(challenge))
}

/// Exchange a signed challenge for a bearer token.
#[utoipa::path(
    post,
    path = "/v1/auth/signin",
    tag = "Auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionToken),
        (status = 400, description = "Malformed address or signature"),
        (status = 401, description = "Missing/expired nonce or failed verification")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SessionToken>, ApiError> {
    let session = state
        .auth
        .sign_in(&request.wallet_address, &request.signature)?;
    Ok(Json(session))
}
