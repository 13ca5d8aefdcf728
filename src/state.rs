// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Shared application state.

use std::sync::Arc;

use crate::auth::AuthService;
use crate::blockchain::ChainGateway;
use crate::deposit::DepositWorkflow;
use crate::ledger::LedgerDb;
use crate::swap::SwapWorkflow;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerDb>,
    pub auth: Arc<AuthService>,
    pub deposits: Arc<DepositWorkflow>,
    pub swaps: Arc<SwapWorkflow>,
    pub chain: Arc<dyn ChainGateway>,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
}
