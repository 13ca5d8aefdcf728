// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{NonceChallenge, SessionToken},
    blockchain::{TokenBalance, TokenTransfer},
    ledger::{DepositStatus, StoredDeposit, StoredTransaction, SwapDetails, TxKind},
    models::WalletAddress,
    state::AppState,
    swap::SwapResult,
};

pub mod auth;
pub mod deposits;
pub mod health;
pub mod swap;
pub mod transactions;
pub mod users;
pub mod webhooks;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/nonce", post(auth::issue_nonce))
        .route("/auth/signin", post(auth::sign_in))
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route("/users/me/onchain-balance", get(users::onchain_balance))
        .route("/users/me/token-transfers", get(users::token_transfers))
        .route(
            "/deposits",
            get(deposits::list_deposits).post(deposits::create_deposit),
        )
        .route("/deposits/confirm", post(deposits::confirm_deposit))
        .route("/transactions", get(transactions::list_transactions))
        .route("/swap", post(swap::execute_swap))
        .route("/webhooks/payments", post(webhooks::payment_webhook))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::issue_nonce,
        auth::sign_in,
        users::get_me,
        users::update_me,
        users::onchain_balance,
        users::token_transfers,
        deposits::create_deposit,
        deposits::confirm_deposit,
        deposits::list_deposits,
        transactions::list_transactions,
        swap::execute_swap,
        webhooks::payment_webhook,
        health::health
    ),
    components(
        schemas(
            auth::NonceRequest,
            auth::SignInRequest,
            NonceChallenge,
            SessionToken,
            WalletAddress,
            users::UserResponse,
            users::UpdateUserRequest,
            users::OnchainBalanceResponse,
            users::TokenTransferListResponse,
            TokenBalance,
            TokenTransfer,
            deposits::CreateDepositRequest,
            deposits::ConfirmDepositRequest,
            deposits::DepositListResponse,
            crate::deposit::DepositConfirmation,
            StoredDeposit,
            DepositStatus,
            transactions::TransactionListResponse,
            StoredTransaction,
            TxKind,
            SwapDetails,
            swap::SwapRequest,
            SwapResult,
            webhooks::WebhookAck,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Wallet challenge/response authentication"),
        (name = "Users", description = "Profile and on-chain wallet data"),
        (name = "Deposits", description = "Card deposits via the payment processor"),
        (name = "Transactions", description = "Ledger history"),
        (name = "Swap", description = "Fiat to asset conversion"),
        (name = "Webhooks", description = "Payment processor callbacks"),
        (name = "Health", description = "Service probes")
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{test_state, TEST_WEBHOOK_SECRET};
    use alloy::signers::{local::PrivateKeySigner, SignerSync};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use hmac::{Hmac, Mac};
    use serde_json::{json, Value};
    use sha2::Sha256;
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Run the challenge/response flow for a fresh random wallet.
    async fn sign_in(app: &Router) -> (PrivateKeySigner, String) {
        let signer = PrivateKeySigner::random();
        let address = signer.address().to_string();

        let (status, challenge) = send(
            app,
            "POST",
            "/v1/auth/nonce",
            None,
            Some(json!({ "wallet_address": address })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let message = challenge["message"].as_str().unwrap();

        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        let (status, session) = send(
            app,
            "POST",
            "/v1/auth/signin",
            None,
            Some(json!({
                "wallet_address": address,
                "signature": alloy::hex::encode_prefixed(signature.as_bytes()),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let token = session["access_token"].as_str().unwrap().to_string();
        (signer, token)
    }

    fn webhook_header(payload: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(TEST_WEBHOOK_SECRET.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        format!(
            "t={timestamp},v1={}",
            alloy::hex::encode(mac.finalize().into_bytes())
        )
    }

    #[tokio::test]
    async fn health_is_public() {
        let (state, _dir) = test_state();
        let app = router(state);
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let (state, _dir) = test_state();
        let app = router(state);

        for uri in ["/v1/users/me", "/v1/transactions", "/v1/deposits"] {
            let (status, body) = send(&app, "GET", uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "Authentication required");
        }
    }

    #[tokio::test]
    async fn sign_in_flow_and_profile() {
        let (state, _dir) = test_state();
        let app = router(state);
        let (signer, token) = sign_in(&app).await;

        let (status, me) = send(&app, "GET", "/v1/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            me["wallet_address"].as_str().unwrap(),
            signer.address().to_string().to_ascii_lowercase()
        );
        assert_eq!(me["balance"], json!("0"));

        let (status, updated) = send(
            &app,
            "PATCH",
            "/v1/users/me",
            Some(&token),
            Some(json!({ "display_name": "Ada" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["display_name"], "Ada");
    }

    #[tokio::test]
    async fn replayed_signature_is_rejected() {
        let (state, _dir) = test_state();
        let app = router(state);

        let signer = PrivateKeySigner::random();
        let address = signer.address().to_string();
        let (_, challenge) = send(
            &app,
            "POST",
            "/v1/auth/nonce",
            None,
            Some(json!({ "wallet_address": address })),
        )
        .await;
        let message = challenge["message"].as_str().unwrap();
        let signature =
            alloy::hex::encode_prefixed(signer.sign_message_sync(message.as_bytes()).unwrap().as_bytes());

        let body = json!({ "wallet_address": address, "signature": signature });
        let (status, _) = send(&app, "POST", "/v1/auth/signin", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);

        // The nonce was consumed by the first exchange
        let (status, _) = send(&app, "POST", "/v1/auth/signin", None, Some(body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn deposit_lifecycle_over_http() {
        let (state, _dir) = test_state();
        let app = router(state);
        let (_signer, token) = sign_in(&app).await;

        let (status, deposit) = send(
            &app,
            "POST",
            "/v1/deposits",
            Some(&token),
            Some(json!({ "amount": "25.00" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(deposit["status"], "pending");
        let intent_id = deposit["payment_intent_id"].as_str().unwrap().to_string();

        let (status, confirmed) = send(
            &app,
            "POST",
            "/v1/deposits/confirm",
            Some(&token),
            Some(json!({
                "payment_intent_id": intent_id,
                "payment_method_ref": "pm_card_visa",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["deposit"]["status"], "completed");
        assert_eq!(confirmed["balance"], json!("25.00"));
        assert!(confirmed["transaction_id"].is_u64());
        assert_eq!(
            confirmed["deposit"]["transaction_id"],
            confirmed["transaction_id"]
        );

        let (status, me) = send(&app, "GET", "/v1/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["balance"], json!("25.00"));

        let (status, listed) = send(&app, "GET", "/v1/deposits", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["total"], 1);

        let (status, txs) = send(&app, "GET", "/v1/transactions", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(txs["transactions"][0]["kind"], "deposit");
        assert_eq!(txs["transactions"][0]["balance_after"], json!("25.00"));
    }

    #[tokio::test]
    async fn swap_over_http() {
        let (state, _dir) = test_state();
        let app = router(state);
        let (_signer, token) = sign_in(&app).await;

        // Fund via deposit first
        let (_, deposit) = send(
            &app,
            "POST",
            "/v1/deposits",
            Some(&token),
            Some(json!({ "amount": "100.00" })),
        )
        .await;
        let intent_id = deposit["payment_intent_id"].as_str().unwrap().to_string();
        send(
            &app,
            "POST",
            "/v1/deposits/confirm",
            Some(&token),
            Some(json!({
                "payment_intent_id": intent_id,
                "payment_method_ref": "pm_card_visa",
            })),
        )
        .await;

        let (status, swap) = send(
            &app,
            "POST",
            "/v1/swap",
            Some(&token),
            Some(json!({ "amount": "40.00" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(swap["quantity"], json!("0.0008"));
        assert_eq!(swap["balance"], json!("60.00"));

        // Overdraw maps to 422
        let (status, _) = send(
            &app,
            "POST",
            "/v1/swap",
            Some(&token),
            Some(json!({ "amount": "500.00" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn webhook_requires_a_valid_signature() {
        let (state, _dir) = test_state();
        let app = router(state);

        let payload =
            r#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_ghost"}}}"#;
        let now = chrono::Utc::now().timestamp();

        // Unsigned request is rejected
        let request = Request::builder()
            .method("POST")
            .uri("/v1/webhooks/payments")
            .header("Content-Type", "application/json")
            .body(Body::from(payload))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // Properly signed request is acknowledged even for an unknown intent
        let request = Request::builder()
            .method("POST")
            .uri("/v1/webhooks/payments")
            .header("Content-Type", "application/json")
            .header("stripe-signature", webhook_header(payload, now))
            .body(Body::from(payload))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().unwrap();
        assert!(json.contains("/v1/auth/nonce"));
        assert!(json.contains("/v1/swap"));
    }
}
