// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Wallet-based authentication.
//!
//! Login is a two-step challenge/response: the client requests a nonce for
//! its wallet address, signs the resulting challenge message with the
//! wallet key (EIP-191 personal_sign) and exchanges the signature for a
//! short-lived bearer token. Handlers require the [`Auth`] extractor.

mod error;
mod extractor;
mod nonce;
mod protocol;
mod token;
mod verifier;

pub use error::AuthError;
pub use extractor::Auth;
pub use nonce::NonceStore;
pub use protocol::{AuthService, NonceChallenge, SessionToken};
pub use token::{Claims, TokenIssuer};
pub use verifier::{EvmSignatureVerifier, SignatureError, SignatureVerifier};
