// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Challenge signature verification.

use std::str::FromStr;

use alloy::primitives::{Address, Signature};

use crate::models::WalletAddress;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed signature")]
    Malformed,
    #[error("signer recovery failed: {0}")]
    Recovery(String),
}

/// Verifies that a signature over a challenge message was produced by the
/// key behind a claimed wallet address.
///
/// Trait seam so the sign-in protocol can be tested without real keys.
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        address: &WalletAddress,
        message: &str,
        signature: &str,
    ) -> Result<bool, SignatureError>;
}

/// EIP-191 `personal_sign` verifier.
///
/// Recovers the signer address from the prefixed message hash and compares
/// it against the claimed address.
pub struct EvmSignatureVerifier;

impl SignatureVerifier for EvmSignatureVerifier {
    fn verify(
        &self,
        address: &WalletAddress,
        message: &str,
        signature: &str,
    ) -> Result<bool, SignatureError> {
        let signature =
            Signature::from_str(signature).map_err(|_| SignatureError::Malformed)?;
        let claimed =
            Address::from_str(address.as_str()).map_err(|_| SignatureError::Malformed)?;

        let recovered = signature
            .recover_address_from_msg(message)
            .map_err(|e| SignatureError::Recovery(e.to_string()))?;

        Ok(recovered == claimed)
    }
}
