// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Single-use login nonces.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::models::WalletAddress;

struct IssuedNonce {
    value: String,
    expires_at: Instant,
}

/// In-process store of pending login nonces, keyed by wallet address.
///
/// One nonce per wallet: issuing a new nonce replaces any outstanding one.
/// Consumption happens through [`NonceStore::take`], which removes the
/// entry under the same lock that reads it, so a nonce can be redeemed at
/// most once regardless of concurrent sign-in attempts.
pub struct NonceStore {
    entries: Mutex<HashMap<String, IssuedNonce>>,
    ttl: Duration,
}

impl NonceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a fresh nonce for the wallet, replacing any existing one.
    pub fn issue(&self, wallet: &WalletAddress) -> String {
        let value = Uuid::new_v4().to_string();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            wallet.as_str().to_string(),
            IssuedNonce {
                value: value.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        value
    }

    /// Remove and return the wallet's pending nonce, if one exists and has
    /// not expired. Expired entries are dropped on the way out.
    pub fn take(&self, wallet: &WalletAddress) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.remove(wallet.as_str())?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value)
    }

    /// Whether a live nonce is pending for the wallet. Read-only.
    #[cfg(test)]
    pub fn contains(&self, wallet: &WalletAddress) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(wallet.as_str())
            .is_some_and(|e| e.expires_at > Instant::now())
    }
}
