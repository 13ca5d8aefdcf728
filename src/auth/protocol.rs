// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! The challenge/response sign-in protocol.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::config;
use crate::error::ServiceError;
use crate::models::{is_valid_signature_format, WalletAddress};

use super::nonce::NonceStore;
use super::token::{Claims, TokenIssuer};
use super::verifier::SignatureVerifier;
use super::AuthError;

/// Challenge returned by the nonce endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NonceChallenge {
    /// Single-use nonce bound to the wallet address.
    pub nonce: String,
    /// Full message the wallet must sign (contains the nonce).
    pub message: String,
    /// Seconds until the nonce expires.
    pub expires_in: u64,
}

/// Bearer token returned after a successful sign-in.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionToken {
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
}

/// Orchestrates nonce issuing, signature checking and token minting.
pub struct AuthService {
    nonces: NonceStore,
    verifier: Arc<dyn SignatureVerifier>,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(verifier: Arc<dyn SignatureVerifier>, tokens: TokenIssuer) -> Self {
        Self {
            nonces: NonceStore::new(Duration::from_secs(config::NONCE_TTL_SECS)),
            verifier,
            tokens,
        }
    }

    /// Issue a login challenge for the wallet address.
    ///
    /// Requesting a new challenge invalidates any outstanding one for the
    /// same wallet.
    pub fn issue_nonce(&self, address_raw: &str) -> Result<NonceChallenge, ServiceError> {
        let wallet = WalletAddress::parse(address_raw).ok_or_else(|| {
            ServiceError::Validation("Invalid wallet address format".to_string())
        })?;

        let nonce = self.nonces.issue(&wallet);
        Ok(NonceChallenge {
            message: challenge_message(&nonce),
            nonce,
            expires_in: config::NONCE_TTL_SECS,
        })
    }

    /// Exchange a signed challenge for a bearer token.
    ///
    /// Input format checks run before the nonce store is touched, so a
    /// malformed request does not burn the pending nonce. An absent,
    /// expired or already-consumed nonce and a failed signature check all
    /// produce the same error category.
    pub fn sign_in(
        &self,
        address_raw: &str,
        signature_raw: &str,
    ) -> Result<SessionToken, ServiceError> {
        let wallet = WalletAddress::parse(address_raw).ok_or_else(|| {
            ServiceError::Validation("Invalid wallet address format".to_string())
        })?;
        if !is_valid_signature_format(signature_raw) {
            return Err(ServiceError::Validation(
                "Invalid signature format".to_string(),
            ));
        }

        // Consumed here whether or not verification succeeds below
        let nonce = self.nonces.take(&wallet).ok_or_else(|| {
            ServiceError::Unauthorized("Invalid or expired nonce".to_string())
        })?;

        let message = challenge_message(&nonce);
        let verified = match self.verifier.verify(&wallet, &message, signature_raw.trim()) {
            Ok(verified) => verified,
            Err(e) => {
                tracing::warn!(wallet = %wallet, error = %e, "signature verification errored");
                false
            }
        };
        if !verified {
            return Err(ServiceError::Unauthorized(
                "Signature verification failed".to_string(),
            ));
        }

        let access_token = self
            .tokens
            .issue(wallet.as_str())
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        info!(wallet = %wallet, "wallet signed in");
        Ok(SessionToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.ttl_secs(),
        })
    }

    /// Verify a bearer token, returning its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.verify(token)
    }

    #[cfg(test)]
    pub(crate) fn nonces(&self) -> &NonceStore {
        &self.nonces
    }
}

/// The exact text the wallet signs. The nonce binds the signature to one
/// login attempt.
fn challenge_message(nonce: &str) -> String {
    format!("Sign this message to log in to Meridian.\n\nNonce: {nonce}")
}
