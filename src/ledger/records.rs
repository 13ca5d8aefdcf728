// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Persisted ledger record types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A user account keyed by wallet address.
///
/// The wallet address is unique and immutable after creation; the balance
/// is mutated exclusively by [`super::LedgerDb`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredUser {
    /// Numeric user ID.
    pub id: u64,
    /// Lowercase EVM wallet address (unique key).
    pub wallet_address: String,
    /// Mutable display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Fiat balance in USD, 2 fractional digits, never negative.
    pub balance: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl StoredUser {
    /// Construct a fresh zero-balance user. The ID is assigned by the store.
    pub fn new(id: u64, wallet_address: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            wallet_address,
            display_name: None,
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Ledger entry kind. Sign semantics: `Deposit` and `TransferIn` credit the
/// balance, the rest debit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Deposit,
    Withdrawal,
    Swap,
    TransferIn,
    TransferOut,
}

impl TxKind {
    /// Whether this kind increases the balance.
    pub fn is_credit(self) -> bool {
        matches!(self, TxKind::Deposit | TxKind::TransferIn)
    }
}

/// Swap-specific settlement fields recorded on a SWAP transaction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct SwapDetails {
    /// Quantity of the target asset transferred on-chain.
    pub settlement_quantity: Decimal,
    /// Asset price used for the conversion (USD per unit).
    pub settlement_price: Decimal,
    /// Hash of the settlement transaction on the chain.
    pub chain_tx_hash: String,
    /// Execution status reported by the chain client at submission time.
    pub execution_status: String,
}

/// Append-only ledger entry.
///
/// `balance_after` is a point-in-time snapshot of the user's balance
/// immediately following this entry. Entries are never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredTransaction {
    /// Monotonic transaction ID (global, assigned by the store).
    pub id: u64,
    /// Owning user ID.
    pub user_id: u64,
    /// Entry kind; the sign of the amount follows from it.
    pub kind: TxKind,
    /// Amount magnitude in USD, 2 fractional digits.
    pub amount: Decimal,
    /// Optional free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional external reference (e.g. payment-intent ID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Balance immediately after this entry was applied.
    pub balance_after: Decimal,
    /// Optional free-form metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Swap settlement details, present only for `kind == Swap`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap: Option<SwapDetails>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl StoredTransaction {
    /// The signed amount this entry contributed to the balance.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// Deposit lifecycle status.
///
/// `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl DepositStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DepositStatus::Completed | DepositStatus::Failed | DepositStatus::Cancelled
        )
    }
}

/// A funding intent persisted when a deposit is created.
///
/// Keyed by the processor's payment-intent ID, which doubles as the
/// idempotency key for crediting.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct StoredDeposit {
    /// Internal deposit ID.
    pub id: String,
    /// Owning user ID.
    pub user_id: u64,
    /// External payment-intent ID (unique).
    pub payment_intent_id: String,
    /// Deposit amount, 2 fractional digits.
    pub amount: Decimal,
    /// ISO currency code (e.g. "USD").
    pub currency: String,
    /// Current lifecycle status.
    pub status: DepositStatus,
    /// Ledger transaction that credited this deposit; set on settlement.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction_id: Option<u64>,
    /// Client secret for completing payment externally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Free-form metadata echoed from the create request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl StoredDeposit {
    /// Construct a new pending deposit referencing a processor intent.
    pub fn new_pending(
        user_id: u64,
        payment_intent_id: String,
        amount: Decimal,
        currency: String,
        client_secret: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            payment_intent_id,
            amount,
            currency,
            status: DepositStatus::Pending,
            transaction_id: None,
            client_secret,
            metadata,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn signed_amount_follows_kind() {
        let mut tx = StoredTransaction {
            id: 1,
            user_id: 1,
            kind: TxKind::Deposit,
            amount: Decimal::new(2500, 2),
            description: None,
            reference: None,
            balance_after: Decimal::new(2500, 2),
            metadata: None,
            swap: None,
            created_at: Utc::now(),
        };
        assert_eq!(tx.signed_amount(), Decimal::new(2500, 2));

        tx.kind = TxKind::Swap;
        assert_eq!(tx.signed_amount(), Decimal::new(-2500, 2));
    }

    #[test]
    fn terminal_statuses() {
        assert!(DepositStatus::Completed.is_terminal());
        assert!(DepositStatus::Failed.is_terminal());
        assert!(DepositStatus::Cancelled.is_terminal());
        assert!(!DepositStatus::Pending.is_terminal());
        assert!(!DepositStatus::Processing.is_terminal());
    }
}
