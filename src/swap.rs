// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Swap workflow: convert fiat balance into the settlement asset.
//!
//! Execution order is balance check, price lookup, on-chain transfer, then
//! the atomic debit + SWAP record. The transfer is deliberately broadcast
//! before the debit; if the debit then fails, the discrepancy is logged
//! with the transaction hash for manual reconciliation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::blockchain::ChainGateway;
use crate::error::ServiceError;
use crate::ledger::{LedgerDb, SwapDetails, TxKind};
use crate::providers::PriceSource;

/// Fractional digits of the settlement asset quantity.
const QUANTITY_SCALE: u32 = 8;

/// Result of an executed swap.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SwapResult {
    /// Ledger transaction recording the debit.
    pub transaction_id: u64,
    /// Fiat amount debited.
    pub amount: Decimal,
    /// Asset quantity transferred on-chain.
    pub quantity: Decimal,
    /// USD price per asset unit used for the conversion.
    pub price: Decimal,
    /// Asset symbol.
    pub asset: String,
    /// Hash of the settlement transaction.
    pub chain_tx_hash: String,
    /// Fiat balance after the debit.
    pub balance: Decimal,
    pub executed_at: DateTime<Utc>,
}

pub struct SwapWorkflow {
    ledger: Arc<LedgerDb>,
    chain: Arc<dyn ChainGateway>,
    prices: Arc<dyn PriceSource>,
    asset_symbol: String,
}

impl SwapWorkflow {
    pub fn new(
        ledger: Arc<LedgerDb>,
        chain: Arc<dyn ChainGateway>,
        prices: Arc<dyn PriceSource>,
        asset_symbol: String,
    ) -> Self {
        Self {
            ledger,
            chain,
            prices,
            asset_symbol,
        }
    }

    pub fn asset_symbol(&self) -> &str {
        &self.asset_symbol
    }

    /// Execute a fiat-to-asset swap for `amount` USD.
    ///
    /// The early balance check fails fast; the debit inside the ledger is
    /// the authoritative overdraw guard under concurrency.
    pub async fn execute(&self, user_id: u64, amount: Decimal) -> Result<SwapResult, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::Validation(
                "Amount must be positive".to_string(),
            ));
        }
        if amount.scale() > 2 {
            return Err(ServiceError::Validation(
                "Amount supports at most 2 decimal places".to_string(),
            ));
        }

        let user = self
            .ledger
            .get_user(user_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {user_id} not found")))?;
        if user.balance < amount {
            return Err(ServiceError::InsufficientFunds(format!(
                "balance {} is less than requested {amount}",
                user.balance
            )));
        }

        let quote = self.prices.latest_price(&self.asset_symbol).await?;
        let quantity = (amount / quote.value).round_dp(QUANTITY_SCALE);
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::Validation(format!(
                "Amount too small to buy any {}",
                self.asset_symbol
            )));
        }

        let transfer = self
            .chain
            .transfer_token(&user.wallet_address, quantity)
            .await?;

        let details = SwapDetails {
            settlement_quantity: quantity,
            settlement_price: quote.value,
            chain_tx_hash: transfer.tx_hash.clone(),
            execution_status: transfer.status,
        };
        let description = format!("Swap {amount} USD for {quantity} {}", self.asset_symbol);
        let receipt = match self.ledger.debit(
            user_id,
            amount,
            TxKind::Swap,
            Some(&description),
            Some(&transfer.tx_hash),
            Some(details),
        ) {
            Ok(receipt) => receipt,
            Err(e) => {
                // The asset already left the treasury; this needs a human
                error!(
                    user_id,
                    tx_hash = %transfer.tx_hash,
                    amount = %amount,
                    error = %e,
                    "swap debit failed after on-chain transfer, manual reconciliation required"
                );
                return Err(ServiceError::Internal(e.to_string()));
            }
        };

        info!(
            user_id,
            transaction_id = receipt.transaction_id,
            amount = %amount,
            quantity = %quantity,
            tx_hash = %transfer.tx_hash,
            "swap executed"
        );
        Ok(SwapResult {
            transaction_id: receipt.transaction_id,
            amount,
            quantity,
            price: quote.value,
            asset: self.asset_symbol.clone(),
            chain_tx_hash: transfer.tx_hash,
            balance: receipt.balance,
            executed_at: Utc::now(),
        })
    }
}
