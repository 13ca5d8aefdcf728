// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! EVM chain integration.
//!
//! This module provides functionality for:
//! - Querying native and ERC-20 token balances
//! - Broadcasting treasury-signed ERC-20 transfers (swap settlement)
//! - Listing historical token transfers for a wallet

pub mod client;
pub mod erc20;
pub mod gateway;

pub use client::EvmChainClient;
pub use gateway::{ChainError, ChainGateway, TokenBalance, TokenTransfer, TransferOutcome};
