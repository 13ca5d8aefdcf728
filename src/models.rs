// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! # Shared API Data Models
//!
//! The [`WalletAddress`] newtype wraps EVM-style addresses (0x-prefixed,
//! 40 hex characters). Address and signature format checks live here so
//! that request validation terminates before any store access.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// EVM-compatible wallet address wrapper.
///
/// Format: `0x` followed by 40 hexadecimal characters (20 bytes). Stored
/// and compared lowercase.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    /// Parse and normalize a wallet address, rejecting anything that is
    /// not `0x` + 40 hex characters.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if is_hex_with_prefix(trimmed, 40) {
            Some(WalletAddress(trimmed.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

/// Check that a secp256k1 signature is `0x` + 130 hex characters
/// (65 bytes: r || s || v).
pub fn is_valid_signature_format(raw: &str) -> bool {
    is_hex_with_prefix(raw.trim(), 130)
}

fn is_hex_with_prefix(value: &str, hex_len: usize) -> bool {
    let Some(hex) = value.strip_prefix("0x") else {
        return false;
    };
    hex.len() == hex_len && hex.chars().all(|c| c.is_ascii_hexdigit())
}
