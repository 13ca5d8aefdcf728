// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Transaction history endpoint.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::Auth;
use crate::error::{ApiError, ServiceError};
use crate::ledger::StoredTransaction;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// Query params for the transaction listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionListQuery {
    /// Cursor from a previous page: only transactions with a smaller ID
    /// are returned.
    pub cursor: Option<u64>,
    /// Page size, capped at 100.
    pub limit: Option<usize>,
}

/// One page of the caller's transaction history, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListResponse {
    pub transactions: Vec<StoredTransaction>,
    /// Pass as `cursor` to fetch the next page; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<u64>,
}

/// Paginated transaction history for the caller.
#[utoipa::path(
    get,
    path = "/v1/transactions",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Transaction page", body = TransactionListResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_transactions(
    Auth(wallet): Auth,
    State(state): State<AppState>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let user = state
        .ledger
        .get_or_create_user(&wallet)
        .map_err(ServiceError::from)?;

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    if limit == 0 {
        return Err(ApiError::bad_request("limit must be positive"));
    }

    let (transactions, next_cursor) = state
        .ledger
        .list_transactions(user.id, query.cursor, limit)
        .map_err(ServiceError::from)?;

    Ok(Json(TransactionListResponse {
        transactions,
        next_cursor,
    }))
}
