// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Meridian - Wallet-Native Neobank Backend
//!
//! Custodial fiat accounts keyed by EVM wallet addresses: users
//! authenticate by signing a challenge with their wallet key, fund their
//! balance by card through the payment processor, and convert balance into
//! on-chain assets settled from the treasury.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Wallet challenge/response authentication and bearer tokens
//! - `ledger` - Embedded ACID balance ledger (redb)
//! - `deposit` / `swap` - Money-movement workflows
//! - `providers` - Payment processor and price feed clients
//! - `blockchain` - EVM settlement integration (alloy)

pub mod api;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod deposit;
pub mod error;
pub mod ledger;
pub mod models;
pub mod providers;
pub mod state;
pub mod swap;
