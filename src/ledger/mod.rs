// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Balance ledger: the single authority for monetary state.
//!
//! Every balance mutation and transaction append happens inside one redb
//! write transaction, so the balance and the history cannot diverge.

mod records;
mod store;

pub use records::{
    DepositStatus, StoredDeposit, StoredTransaction, StoredUser, SwapDetails, TxKind,
};
pub use store::{LedgerDb, LedgerError, LedgerReceipt, LedgerResult, SettlementOutcome};
