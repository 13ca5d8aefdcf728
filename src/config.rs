// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the ledger database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `AUTH_TOKEN_SECRET` | HS256 secret for bearer tokens | Required |
//! | `AUTH_TOKEN_TTL_SECS` | Bearer token lifetime | `86400` |
//! | `STRIPE_API_BASE_URL` | Payment processor API base | `https://api.stripe.com` |
//! | `STRIPE_SECRET_KEY` | Payment processor secret key | Required |
//! | `STRIPE_WEBHOOK_SECRET` | Webhook HMAC secret | Required |
//! | `PRICE_API_BASE_URL` | Price feed API base | `https://api.coinbase.com` |
//! | `CHAIN_RPC_URL` | EVM RPC endpoint for settlement | Required |
//! | `TREASURY_PRIVATE_KEY` | Hex private key funding swap transfers | Required |
//! | `SWAP_TOKEN_ADDRESS` | ERC-20 contract settled by swaps | Required |
//! | `SWAP_TOKEN_SYMBOL` | Display symbol of the settlement token | `BTC` |
//! | `SWAP_TOKEN_DECIMALS` | Decimals of the settlement token | `8` |
//! | `CHAIN_NATIVE_SYMBOL` | Display symbol of the native asset | `ETH` |
//! | `SWAP_ASSET_SYMBOL` | Price feed symbol for the swap asset | `BTC` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

/// Environment variable name for the ledger data directory path.
///
/// The ledger database file (`ledger.redb`) lives under this directory.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default ledger data directory.
pub const DEFAULT_DATA_DIR: &str = "/data";

/// Environment variable for the bearer-token signing secret.
pub const AUTH_TOKEN_SECRET_ENV: &str = "AUTH_TOKEN_SECRET";

/// Environment variable for the bearer-token lifetime in seconds.
pub const AUTH_TOKEN_TTL_ENV: &str = "AUTH_TOKEN_TTL_SECS";

/// Default bearer-token lifetime (24 hours).
pub const DEFAULT_AUTH_TOKEN_TTL_SECS: u64 = 86_400;

/// Lifetime of an authentication nonce. Sign-in must consume the nonce
/// within this window.
pub const NONCE_TTL_SECS: u64 = 120;

/// How long a fetched asset price may be served from cache.
pub const PRICE_CACHE_TTL_SECS: u64 = 30;

/// Environment variable for the price feed symbol of the swap asset.
pub const SWAP_ASSET_SYMBOL_ENV: &str = "SWAP_ASSET_SYMBOL";

/// Default swap asset symbol.
pub const DEFAULT_SWAP_ASSET_SYMBOL: &str = "BTC";

/// Read an environment variable, treating empty/whitespace values as unset.
pub fn env_optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(_) => None,
    }
}

/// Read an environment variable with a fallback default.
pub fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}
