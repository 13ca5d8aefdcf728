// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Embedded ledger database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `users_by_wallet`: lowercase wallet address → user_id
//! - `transactions`: tx_id → serialized StoredTransaction
//! - `user_tx_index`: (user_id, tx_id) → () for per-user history scans
//! - `deposits`: payment-intent ID → serialized StoredDeposit
//! - `counters`: key → next numeric ID
//!
//! Balance mutations, transaction appends and deposit status transitions
//! all happen inside a single `begin_write()`/`commit()` unit. redb admits
//! one writer at a time, which is exactly the per-entity atomicity the
//! credit/debit and settle paths rely on.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use rust_decimal::Decimal;

use crate::error::ServiceError;
use crate::models::WalletAddress;

use super::records::{DepositStatus, StoredDeposit, StoredTransaction, StoredUser, SwapDetails, TxKind};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary user table: user_id → serialized StoredUser (JSON bytes).
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Unique index: lowercase wallet address → user_id.
const USERS_BY_WALLET: TableDefinition<&str, u64> = TableDefinition::new("users_by_wallet");

/// Append-only transaction table: tx_id → serialized StoredTransaction.
const TRANSACTIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("transactions");

/// Index: (user_id, tx_id) → (). Tx IDs are monotonic, so iterating the
/// range in reverse yields newest-first history.
const USER_TX_INDEX: TableDefinition<(u64, u64), ()> = TableDefinition::new("user_tx_index");

/// Deposits keyed by the processor's payment-intent ID (the idempotency key).
const DEPOSITS: TableDefinition<&str, &[u8]> = TableDefinition::new("deposits");

/// ID counters: key → last assigned value.
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const USER_COUNTER: &str = "user_id";
const TX_COUNTER: &str = "tx_id";

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("duplicate reference: {0}")]
    DuplicateReference(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(msg) => ServiceError::NotFound(msg),
            LedgerError::InsufficientFunds { balance, requested } => {
                ServiceError::InsufficientFunds(format!(
                    "balance {balance} is less than requested {requested}"
                ))
            }
            LedgerError::InvalidAmount(amount) => {
                ServiceError::Validation(format!("amount must be positive, got {amount}"))
            }
            LedgerError::DuplicateReference(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

// =============================================================================
// Result Types
// =============================================================================

/// Outcome of a successful balance mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReceipt {
    /// ID of the appended transaction.
    pub transaction_id: u64,
    /// Balance immediately after the mutation.
    pub balance: Decimal,
}

/// Outcome of a deposit settlement attempt.
///
/// Both the synchronous confirm path and the asynchronous webhook path call
/// [`LedgerDb::settle_deposit`]; whichever observes the deposit first gets
/// `Credited`, the loser gets `AlreadyCompleted` and no-ops.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// This call performed the transition and the credit.
    Credited {
        receipt: LedgerReceipt,
        deposit: StoredDeposit,
    },
    /// The deposit was already completed; nothing was changed.
    AlreadyCompleted,
    /// The deposit is in a terminal failure state; nothing was changed.
    TerminalFailure,
    /// No deposit exists for this intent ID.
    NotFound,
}

// =============================================================================
// LedgerDb
// =============================================================================

/// Embedded ACID ledger database.
pub struct LedgerDb {
    db: Database,
}

impl LedgerDb {
    /// Open (or create) the ledger database at the given path.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERS_BY_WALLET)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(USER_TX_INDEX)?;
            let _ = write_txn.open_table(DEPOSITS)?;
            let _ = write_txn.open_table(COUNTERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Look up a user by wallet address, creating one lazily if absent.
    ///
    /// The wallet address is the unique key; a concurrent call for the same
    /// address serializes on the write transaction and returns the same row.
    pub fn get_or_create_user(&self, wallet: &WalletAddress) -> LedgerResult<StoredUser> {
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut by_wallet = write_txn.open_table(USERS_BY_WALLET)?;
            let mut users = write_txn.open_table(USERS)?;
            let mut counters = write_txn.open_table(COUNTERS)?;

            let existing_id = by_wallet.get(wallet.as_str())?.map(|v| v.value());
            match existing_id {
                Some(id) => {
                    let bytes = users
                        .get(id)?
                        .ok_or_else(|| LedgerError::NotFound(format!("User {id}")))?
                        .value()
                        .to_vec();
                    serde_json::from_slice(&bytes)?
                }
                None => {
                    let id = next_counter(&mut counters, USER_COUNTER)?;
                    let user = StoredUser::new(id, wallet.as_str().to_string());
                    users.insert(id, serde_json::to_vec(&user)?.as_slice())?;
                    by_wallet.insert(wallet.as_str(), id)?;
                    user
                }
            }
        };
        write_txn.commit()?;
        Ok(user)
    }

    /// Look up a user by numeric ID.
    pub fn get_user(&self, user_id: u64) -> LedgerResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user by lowercase wallet address.
    pub fn get_user_by_wallet(&self, wallet: &str) -> LedgerResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let by_wallet = read_txn.open_table(USERS_BY_WALLET)?;
        let Some(id) = by_wallet.get(wallet)?.map(|v| v.value()) else {
            return Ok(None);
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Update a user's display name.
    pub fn set_display_name(&self, user_id: u64, name: &str) -> LedgerResult<StoredUser> {
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let bytes = {
                let guard = users
                    .get(user_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("User {user_id}")))?;
                guard.value().to_vec()
            };
            let mut user: StoredUser = serde_json::from_slice(&bytes)?;
            user.display_name = Some(name.to_string());
            user.updated_at = Utc::now();
            users.insert(user_id, serde_json::to_vec(&user)?.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    // =========================================================================
    // Balance mutation (crate-internal)
    // =========================================================================

    /// Credit the user's balance and append a matching transaction.
    ///
    /// Crate-internal: only the deposit and swap workflows may call this,
    /// after independently verifying the business justification.
    pub(crate) fn credit(
        &self,
        user_id: u64,
        amount: Decimal,
        kind: TxKind,
        description: Option<&str>,
        reference: Option<&str>,
    ) -> LedgerResult<LedgerReceipt> {
        debug_assert!(kind.is_credit());
        self.apply_entry(user_id, amount, kind, description, reference, None)
    }

    /// Debit the user's balance and append a matching transaction, failing
    /// with `InsufficientFunds` when the balance does not cover the amount.
    ///
    /// The balance check and the decrement happen inside the same write
    /// transaction; two racing debits cannot both pass a stale check.
    pub(crate) fn debit(
        &self,
        user_id: u64,
        amount: Decimal,
        kind: TxKind,
        description: Option<&str>,
        reference: Option<&str>,
        swap: Option<SwapDetails>,
    ) -> LedgerResult<LedgerReceipt> {
        debug_assert!(!kind.is_credit());
        self.apply_entry(user_id, amount, kind, description, reference, swap)
    }

    fn apply_entry(
        &self,
        user_id: u64,
        amount: Decimal,
        kind: TxKind,
        description: Option<&str>,
        reference: Option<&str>,
        swap: Option<SwapDetails>,
    ) -> LedgerResult<LedgerReceipt> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let write_txn = self.db.begin_write()?;
        let receipt = {
            let mut users = write_txn.open_table(USERS)?;
            let mut transactions = write_txn.open_table(TRANSACTIONS)?;
            let mut index = write_txn.open_table(USER_TX_INDEX)?;
            let mut counters = write_txn.open_table(COUNTERS)?;

            let bytes = {
                let guard = users
                    .get(user_id)?
                    .ok_or_else(|| LedgerError::NotFound(format!("User {user_id}")))?;
                guard.value().to_vec()
            };
            let mut user: StoredUser = serde_json::from_slice(&bytes)?;

            let new_balance = if kind.is_credit() {
                user.balance + amount
            } else {
                if user.balance < amount {
                    return Err(LedgerError::InsufficientFunds {
                        balance: user.balance,
                        requested: amount,
                    });
                }
                user.balance - amount
            };

            user.balance = new_balance;
            user.updated_at = Utc::now();
            users.insert(user_id, serde_json::to_vec(&user)?.as_slice())?;

            let tx_id = next_counter(&mut counters, TX_COUNTER)?;
            let entry = StoredTransaction {
                id: tx_id,
                user_id,
                kind,
                amount,
                description: description.map(str::to_string),
                reference: reference.map(str::to_string),
                balance_after: new_balance,
                metadata: None,
                swap,
                created_at: Utc::now(),
            };
            transactions.insert(tx_id, serde_json::to_vec(&entry)?.as_slice())?;
            index.insert((user_id, tx_id), ())?;

            LedgerReceipt {
                transaction_id: tx_id,
                balance: new_balance,
            }
        };
        write_txn.commit()?;
        Ok(receipt)
    }

    // =========================================================================
    // Deposits
    // =========================================================================

    /// Persist a new deposit, enforcing uniqueness of the payment-intent ID.
    pub fn create_deposit(&self, deposit: &StoredDeposit) -> LedgerResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut deposits = write_txn.open_table(DEPOSITS)?;
            let exists = deposits.get(deposit.payment_intent_id.as_str())?.is_some();
            if exists {
                return Err(LedgerError::DuplicateReference(format!(
                    "Deposit for intent {} already exists",
                    deposit.payment_intent_id
                )));
            }
            deposits.insert(
                deposit.payment_intent_id.as_str(),
                serde_json::to_vec(deposit)?.as_slice(),
            )?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a deposit by payment-intent ID.
    pub fn get_deposit(&self, intent_id: &str) -> LedgerResult<Option<StoredDeposit>> {
        let read_txn = self.db.begin_read()?;
        let deposits = read_txn.open_table(DEPOSITS)?;
        match deposits.get(intent_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// List a user's deposits, newest first.
    pub fn list_deposits(&self, user_id: u64) -> LedgerResult<Vec<StoredDeposit>> {
        let read_txn = self.db.begin_read()?;
        let deposits = read_txn.open_table(DEPOSITS)?;

        let mut records = Vec::new();
        for entry in deposits.iter()? {
            let entry = entry?;
            let record: StoredDeposit = serde_json::from_slice(entry.1.value())?;
            if record.user_id == user_id {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Transition a deposit to COMPLETED and credit the owner, atomically.
    ///
    /// The status check, the transition, the balance increment and the
    /// transaction append share one write transaction. A deposit reaches
    /// COMPLETED at most once no matter how many confirm calls and webhook
    /// deliveries race for it.
    pub(crate) fn settle_deposit(&self, intent_id: &str) -> LedgerResult<SettlementOutcome> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut deposits = write_txn.open_table(DEPOSITS)?;
            let mut users = write_txn.open_table(USERS)?;
            let mut transactions = write_txn.open_table(TRANSACTIONS)?;
            let mut index = write_txn.open_table(USER_TX_INDEX)?;
            let mut counters = write_txn.open_table(COUNTERS)?;

            let deposit_bytes = match deposits.get(intent_id)? {
                Some(guard) => guard.value().to_vec(),
                None => return Ok(SettlementOutcome::NotFound),
            };
            let mut deposit: StoredDeposit = serde_json::from_slice(&deposit_bytes)?;

            match deposit.status {
                DepositStatus::Completed => return Ok(SettlementOutcome::AlreadyCompleted),
                DepositStatus::Failed | DepositStatus::Cancelled => {
                    return Ok(SettlementOutcome::TerminalFailure)
                }
                DepositStatus::Pending | DepositStatus::Processing => {}
            }

            let user_bytes = {
                let guard = users.get(deposit.user_id)?.ok_or_else(|| {
                    LedgerError::NotFound(format!("User {}", deposit.user_id))
                })?;
                guard.value().to_vec()
            };
            let mut user: StoredUser = serde_json::from_slice(&user_bytes)?;

            user.balance += deposit.amount;
            user.updated_at = Utc::now();
            users.insert(deposit.user_id, serde_json::to_vec(&user)?.as_slice())?;

            let tx_id = next_counter(&mut counters, TX_COUNTER)?;
            let entry = StoredTransaction {
                id: tx_id,
                user_id: deposit.user_id,
                kind: TxKind::Deposit,
                amount: deposit.amount,
                description: Some(format!("Deposit {intent_id}")),
                reference: Some(intent_id.to_string()),
                balance_after: user.balance,
                metadata: None,
                swap: None,
                created_at: Utc::now(),
            };
            transactions.insert(tx_id, serde_json::to_vec(&entry)?.as_slice())?;
            index.insert((deposit.user_id, tx_id), ())?;

            deposit.status = DepositStatus::Completed;
            deposit.transaction_id = Some(tx_id);
            deposit.updated_at = Utc::now();
            deposits.insert(intent_id, serde_json::to_vec(&deposit)?.as_slice())?;

            SettlementOutcome::Credited {
                receipt: LedgerReceipt {
                    transaction_id: tx_id,
                    balance: user.balance,
                },
                deposit,
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    /// Transition a non-terminal deposit to FAILED or CANCELLED. No ledger
    /// effect.
    ///
    /// Returns `false` when no deposit exists for the intent ID or the
    /// deposit already reached a terminal state.
    pub(crate) fn mark_deposit_terminal(
        &self,
        intent_id: &str,
        status: DepositStatus,
    ) -> LedgerResult<bool> {
        debug_assert!(matches!(
            status,
            DepositStatus::Failed | DepositStatus::Cancelled
        ));
        let write_txn = self.db.begin_write()?;
        let changed = {
            let mut deposits = write_txn.open_table(DEPOSITS)?;
            let deposit_bytes = match deposits.get(intent_id)? {
                Some(guard) => guard.value().to_vec(),
                None => return Ok(false),
            };
            let mut deposit: StoredDeposit = serde_json::from_slice(&deposit_bytes)?;
            if deposit.status.is_terminal() {
                return Ok(false);
            }
            deposit.status = status;
            deposit.updated_at = Utc::now();
            deposits.insert(intent_id, serde_json::to_vec(&deposit)?.as_slice())?;
            true
        };
        write_txn.commit()?;
        Ok(changed)
    }

    // =========================================================================
    // Transaction history
    // =========================================================================

    /// Paginated newest-first transaction listing for a user.
    ///
    /// `before` is an exclusive upper bound on the transaction ID (the
    /// cursor from a previous page). Returns `(transactions, next_cursor)`.
    pub fn list_transactions(
        &self,
        user_id: u64,
        before: Option<u64>,
        limit: usize,
    ) -> LedgerResult<(Vec<StoredTransaction>, Option<u64>)> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USER_TX_INDEX)?;
        let transactions = read_txn.open_table(TRANSACTIONS)?;

        let upper = before.map(|b| b.saturating_sub(1)).unwrap_or(u64::MAX);
        let range = index.range((user_id, 0u64)..=(user_id, upper))?;

        let mut results = Vec::with_capacity(limit);
        for entry in range.rev() {
            let entry = entry?;
            let (_, tx_id) = entry.0.value();
            let Some(value) = transactions.get(tx_id)? else {
                continue;
            };
            results.push(serde_json::from_slice::<StoredTransaction>(value.value())?);
            if results.len() >= limit {
                break;
            }
        }

        let next_cursor = if results.len() >= limit {
            results.last().map(|tx| tx.id)
        } else {
            None
        };
        Ok((results, next_cursor))
    }
}

/// Bump and return the next value of a named counter within the caller's
/// write transaction.
fn next_counter(
    counters: &mut redb::Table<'_, &'static str, u64>,
    key: &'static str,
) -> LedgerResult<u64> {
    let next = {
        let current = counters.get(key)?.map(|v| v.value()).unwrap_or(0);
        current + 1
    };
    counters.insert(key, next)?;
    Ok(next)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_db() -> (LedgerDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(&dir.path().join("ledger.redb")).unwrap();
        (db, dir)
    }

    fn wallet(n: u8) -> WalletAddress {
        WalletAddress::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn usd(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn sample_deposit(user_id: u64, intent: &str, amount: &str) -> StoredDeposit {
        StoredDeposit::new_pending(
            user_id,
            intent.to_string(),
            usd(amount),
            "USD".to_string(),
            Some("secret_123".to_string()),
            None,
        )
    }

    #[test]
    fn get_or_create_user_is_idempotent() {
        let (db, _dir) = temp_db();
        let first = db.get_or_create_user(&wallet(1)).unwrap();
        let second = db.get_or_create_user(&wallet(1)).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.balance, Decimal::ZERO);

        let other = db.get_or_create_user(&wallet(2)).unwrap();
        assert_ne!(first.id, other.id);
    }

    #[test]
    fn credit_and_debit_track_balance_after() {
        let (db, _dir) = temp_db();
        let user = db.get_or_create_user(&wallet(1)).unwrap();

        let r1 = db
            .credit(user.id, usd("100.00"), TxKind::Deposit, None, None)
            .unwrap();
        assert_eq!(r1.balance, usd("100.00"));

        let r2 = db
            .debit(user.id, usd("30.00"), TxKind::Withdrawal, None, None, None)
            .unwrap();
        assert_eq!(r2.balance, usd("70.00"));

        let r3 = db
            .credit(user.id, usd("5.50"), TxKind::TransferIn, None, None)
            .unwrap();
        assert_eq!(r3.balance, usd("75.50"));

        // balance_after must equal the running prefix sum at every entry
        let (txs, _) = db.list_transactions(user.id, None, 50).unwrap();
        let mut running = Decimal::ZERO;
        for tx in txs.iter().rev() {
            running += tx.signed_amount();
            assert_eq!(tx.balance_after, running);
        }
        assert_eq!(running, usd("75.50"));

        let stored = db.get_user(user.id).unwrap().unwrap();
        assert_eq!(stored.balance, usd("75.50"));
    }

    #[test]
    fn debit_rejects_overdraw() {
        let (db, _dir) = temp_db();
        let user = db.get_or_create_user(&wallet(1)).unwrap();
        db.credit(user.id, usd("10.00"), TxKind::Deposit, None, None)
            .unwrap();

        let err = db
            .debit(user.id, usd("10.01"), TxKind::Withdrawal, None, None, None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        // Nothing was appended for the failed debit
        let (txs, _) = db.list_transactions(user.id, None, 10).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(db.get_user(user.id).unwrap().unwrap().balance, usd("10.00"));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let (db, _dir) = temp_db();
        let user = db.get_or_create_user(&wallet(1)).unwrap();
        let err = db
            .credit(user.id, Decimal::ZERO, TxKind::Deposit, None, None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
    }

    #[test]
    fn concurrent_debits_overdraw_exactly_once() {
        let (db, _dir) = temp_db();
        let db = Arc::new(db);
        let user = db.get_or_create_user(&wallet(1)).unwrap();
        db.credit(user.id, usd("100.00"), TxKind::Deposit, None, None)
            .unwrap();

        // Two debits of 60 each fit individually but not together.
        let mut handles = Vec::new();
        for _ in 0..2 {
            let db = Arc::clone(&db);
            let user_id = user.id;
            handles.push(std::thread::spawn(move || {
                db.debit(user_id, usd("60.00"), TxKind::Withdrawal, None, None, None)
            }));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        let overdraws = results
            .iter()
            .filter(|r| matches!(r, Err(LedgerError::InsufficientFunds { .. })))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(overdraws, 1);
        assert_eq!(db.get_user(user.id).unwrap().unwrap().balance, usd("40.00"));
    }

    #[test]
    fn duplicate_intent_id_is_rejected() {
        let (db, _dir) = temp_db();
        let user = db.get_or_create_user(&wallet(1)).unwrap();
        let deposit = sample_deposit(user.id, "pi_1", "25.00");
        db.create_deposit(&deposit).unwrap();

        let dup = sample_deposit(user.id, "pi_1", "25.00");
        let err = db.create_deposit(&dup).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateReference(_)));
    }

    #[test]
    fn settle_deposit_credits_exactly_once() {
        let (db, _dir) = temp_db();
        let user = db.get_or_create_user(&wallet(1)).unwrap();
        db.create_deposit(&sample_deposit(user.id, "pi_1", "25.00"))
            .unwrap();

        let first = db.settle_deposit("pi_1").unwrap();
        let SettlementOutcome::Credited { receipt, deposit } = first else {
            panic!("first settle should credit");
        };
        assert_eq!(receipt.balance, usd("25.00"));
        assert_eq!(deposit.status, DepositStatus::Completed);
        assert_eq!(deposit.transaction_id, Some(receipt.transaction_id));

        // The stored record carries the crediting transaction
        let stored = db.get_deposit("pi_1").unwrap().unwrap();
        assert_eq!(stored.transaction_id, Some(receipt.transaction_id));

        // Second settlement (the losing confirm/webhook path) is a no-op
        let second = db.settle_deposit("pi_1").unwrap();
        assert_eq!(second, SettlementOutcome::AlreadyCompleted);

        let (txs, _) = db.list_transactions(user.id, None, 10).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, usd("25.00"));
        assert_eq!(txs[0].reference.as_deref(), Some("pi_1"));
        assert_eq!(db.get_user(user.id).unwrap().unwrap().balance, usd("25.00"));
    }

    #[test]
    fn settle_deposit_races_credit_exactly_once() {
        let (db, _dir) = temp_db();
        let db = Arc::new(db);
        let user = db.get_or_create_user(&wallet(1)).unwrap();
        db.create_deposit(&sample_deposit(user.id, "pi_race", "10.00"))
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let db = Arc::clone(&db);
            handles.push(std::thread::spawn(move || db.settle_deposit("pi_race")));
        }
        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        let credited = outcomes
            .iter()
            .filter(|o| matches!(o, SettlementOutcome::Credited { .. }))
            .count();
        assert_eq!(credited, 1);
        assert_eq!(db.get_user(user.id).unwrap().unwrap().balance, usd("10.00"));
    }

    #[test]
    fn settle_unknown_intent_reports_not_found() {
        let (db, _dir) = temp_db();
        assert_eq!(
            db.settle_deposit("pi_missing").unwrap(),
            SettlementOutcome::NotFound
        );
    }

    #[test]
    fn failed_deposit_is_not_credited_later() {
        let (db, _dir) = temp_db();
        let user = db.get_or_create_user(&wallet(1)).unwrap();
        db.create_deposit(&sample_deposit(user.id, "pi_1", "25.00"))
            .unwrap();

        assert!(db
            .mark_deposit_terminal("pi_1", DepositStatus::Failed)
            .unwrap());
        assert_eq!(
            db.settle_deposit("pi_1").unwrap(),
            SettlementOutcome::TerminalFailure
        );
        assert_eq!(db.get_user(user.id).unwrap().unwrap().balance, Decimal::ZERO);

        // Already terminal: a second failure event changes nothing
        assert!(!db
            .mark_deposit_terminal("pi_1", DepositStatus::Failed)
            .unwrap());
    }

    #[test]
    fn cancelled_deposit_keeps_its_own_terminal_state() {
        let (db, _dir) = temp_db();
        let user = db.get_or_create_user(&wallet(1)).unwrap();
        db.create_deposit(&sample_deposit(user.id, "pi_1", "25.00"))
            .unwrap();

        assert!(db
            .mark_deposit_terminal("pi_1", DepositStatus::Cancelled)
            .unwrap());
        let stored = db.get_deposit("pi_1").unwrap().unwrap();
        assert_eq!(stored.status, DepositStatus::Cancelled);

        assert_eq!(
            db.settle_deposit("pi_1").unwrap(),
            SettlementOutcome::TerminalFailure
        );
        assert_eq!(db.get_user(user.id).unwrap().unwrap().balance, Decimal::ZERO);
    }

    #[test]
    fn list_transactions_paginates_newest_first() {
        let (db, _dir) = temp_db();
        let user = db.get_or_create_user(&wallet(1)).unwrap();
        for i in 1..=5 {
            db.credit(
                user.id,
                Decimal::from(i),
                TxKind::Deposit,
                Some(&format!("credit {i}")),
                None,
            )
            .unwrap();
        }

        let (page1, cursor) = db.list_transactions(user.id, None, 2).unwrap();
        assert_eq!(page1.len(), 2);
        assert!(page1[0].id > page1[1].id);
        assert!(cursor.is_some());

        let (page2, cursor2) = db.list_transactions(user.id, cursor, 2).unwrap();
        assert_eq!(page2.len(), 2);
        assert!(page2[0].id < page1[1].id);

        let (page3, cursor3) = db.list_transactions(user.id, cursor2, 2).unwrap();
        assert_eq!(page3.len(), 1);
        assert!(cursor3.is_none());
    }

    #[test]
    fn history_is_isolated_per_user() {
        let (db, _dir) = temp_db();
        let alice = db.get_or_create_user(&wallet(1)).unwrap();
        let bob = db.get_or_create_user(&wallet(2)).unwrap();
        db.credit(alice.id, usd("1.00"), TxKind::Deposit, None, None)
            .unwrap();
        db.credit(bob.id, usd("2.00"), TxKind::Deposit, None, None)
            .unwrap();

        let (alice_txs, _) = db.list_transactions(alice.id, None, 10).unwrap();
        assert_eq!(alice_txs.len(), 1);
        assert_eq!(alice_txs[0].amount, usd("1.00"));
    }
}
