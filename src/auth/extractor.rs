// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Axum extractor for authenticated wallets.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(wallet): Auth) -> impl IntoResponse {
//!     // wallet is the authenticated WalletAddress
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::models::WalletAddress;
use crate::state::AppState;

use super::AuthError;

/// Extractor that validates the bearer token and yields the wallet address
/// it was issued to.
pub struct Auth(pub WalletAddress);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = state.auth.verify_token(token)?;
        let wallet = WalletAddress::parse(&claims.sub).ok_or(AuthError::MalformedToken)?;

        Ok(Auth(wallet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use axum::http::Request;

    const WALLET: &str = "0x742d35cc6634c0532925a3b844bc9e7595f4ab12";

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = value {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn rejects_a_missing_header() {
        let (state, _dir) = test_state();
        let mut parts = parts_with_header(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn rejects_a_non_bearer_header() {
        let (state, _dir) = test_state();
        let mut parts = parts_with_header(Some("Basic dXNlcjpwYXNz"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn rejects_a_garbage_token() {
        let (state, _dir) = test_state();
        let mut parts = parts_with_header(Some("Bearer not.a.token"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn accepts_a_token_minted_by_the_service() {
        let (state, _dir) = test_state();
        // Mint directly through the token path the service uses
        let issuer = crate::auth::TokenIssuer::new("test-token-secret", 3600);
        let token = issuer.issue(WALLET).unwrap();
        let mut parts = parts_with_header(Some(&format!("Bearer {token}")));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        let Auth(wallet) = result.expect("valid token accepted");
        assert_eq!(wallet.as_str(), WALLET);
    }
}
