// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Chain gateway trait and wire types.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ServiceError;

/// Errors that can occur during chain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl From<ChainError> for ServiceError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::InvalidAddress(msg) | ChainError::InvalidQuantity(msg) => {
                ServiceError::Validation(msg)
            }
            other => ServiceError::ExternalService(other.to_string()),
        }
    }
}

/// A balance reading for one asset.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenBalance {
    /// Asset symbol.
    pub symbol: String,
    /// Balance in the asset's smallest unit, as a decimal string.
    pub balance_raw: String,
    /// Human-readable balance.
    pub balance_formatted: String,
    /// Decimal places of the asset.
    pub decimals: u8,
    /// Token contract address; absent for the native asset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
}

/// One historical ERC-20 transfer touching a wallet.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenTransfer {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    /// Transfer quantity in whole-asset units.
    pub quantity: String,
    pub block_number: u64,
}

/// Result of a broadcast settlement transfer.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Hash of the broadcast transaction.
    pub tx_hash: String,
    /// Status reported at submission time (e.g. "submitted").
    pub status: String,
}

/// Read and write access to the settlement chain.
///
/// Trait seam so the swap workflow and the wallet endpoints can be tested
/// without an RPC node.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Native asset balance of an address.
    async fn native_balance(&self, address: &str) -> Result<TokenBalance, ChainError>;

    /// Configured settlement-token balance of an address.
    async fn token_balance(&self, address: &str) -> Result<TokenBalance, ChainError>;

    /// Transfer `quantity` (whole-asset units) of the settlement token from
    /// the treasury to `to`. Returns once the transaction is broadcast.
    async fn transfer_token(
        &self,
        to: &str,
        quantity: Decimal,
    ) -> Result<TransferOutcome, ChainError>;

    /// Settlement-token transfers where `address` is sender or recipient.
    async fn token_transfer_logs(
        &self,
        address: &str,
        from_block: Option<u64>,
    ) -> Result<Vec<TokenTransfer>, ChainError>;
}
