// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Card-payment processor integration (Stripe-compatible API).
//!
//! Covers payment-intent creation and confirmation plus webhook signature
//! verification. Webhook payloads are authenticated with HMAC-SHA256 over
//! `"{timestamp}.{raw_body}"` against the shared endpoint secret, with a
//! bounded timestamp window to blunt replay.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::Value;
use sha2::Sha256;

use crate::config::{env_optional, env_or_default};
use crate::error::ServiceError;

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Maximum age of a webhook timestamp, in seconds.
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Processor-side lifecycle state of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    RequiresConfirmation,
    Processing,
    Succeeded,
    Failed,
    Cancelled,
}

/// A payment intent as reported by the processor.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: IntentStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment processor configuration missing: {0}")]
    MissingConfig(String),

    #[error("payment processor request failed: {0}")]
    Request(String),

    #[error("payment processor response was invalid: {0}")]
    InvalidResponse(String),
}

impl From<PaymentError> for ServiceError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::MissingConfig(msg) => ServiceError::Internal(msg),
            other => ServiceError::ExternalService(other.to_string()),
        }
    }
}

/// Payment-intent operations against the processor.
///
/// Trait seam so the deposit workflow can be tested without network calls.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for `amount_minor` minor units of `currency`.
    async fn create_intent(
        &self,
        amount_minor: u64,
        currency: &str,
        user_id: u64,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Confirm an intent with the given payment method and return its
    /// resulting status.
    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method_ref: &str,
    ) -> Result<IntentStatus, PaymentError>;
}

/// HTTP client for the processor's REST API.
#[derive(Debug, Clone)]
pub struct PaymentApiClient {
    base_url: String,
    secret_key: String,
    http: Client,
}

impl PaymentApiClient {
    pub fn is_configured() -> bool {
        env_optional("STRIPE_SECRET_KEY").is_some()
    }

    pub fn from_env() -> Result<Self, PaymentError> {
        let base_url = env_or_default("STRIPE_API_BASE_URL", DEFAULT_API_BASE_URL);
        let secret_key = env_optional("STRIPE_SECRET_KEY")
            .ok_or_else(|| PaymentError::MissingConfig("STRIPE_SECRET_KEY".to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PaymentError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            secret_key,
            http,
        })
    }

    fn parse_intent(body: &Value) -> Result<PaymentIntent, PaymentError> {
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| PaymentError::InvalidResponse("missing intent id".to_string()))?;
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| PaymentError::InvalidResponse("missing intent status".to_string()))?;

        Ok(PaymentIntent {
            id: id.to_string(),
            client_secret: body
                .get("client_secret")
                .and_then(Value::as_str)
                .map(str::to_string),
            status: map_intent_status(status),
        })
    }
}

#[async_trait]
impl PaymentGateway for PaymentApiClient {
    async fn create_intent(
        &self,
        amount_minor: u64,
        currency: &str,
        user_id: u64,
    ) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&[
                ("amount", amount_minor.to_string()),
                ("currency", currency.to_ascii_lowercase()),
                ("metadata[user_id]", user_id.to_string()),
            ])
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::Request(format!(
                "intent creation returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        Self::parse_intent(&body)
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method_ref: &str,
    ) -> Result<IntentStatus, PaymentError> {
        let response = self
            .http
            .post(format!(
                "{}/v1/payment_intents/{}/confirm",
                self.base_url, intent_id
            ))
            .bearer_auth(&self.secret_key)
            .form(&[("payment_method", payment_method_ref)])
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::Request(format!(
                "intent confirmation returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| PaymentError::InvalidResponse("missing intent status".to_string()))?;
        Ok(map_intent_status(status))
    }
}

/// Map the processor's raw status string to [`IntentStatus`].
///
/// Unrecognized statuses read as `Processing` so callers retry rather than
/// treat them as failures.
pub fn map_intent_status(raw_status: &str) -> IntentStatus {
    match raw_status.to_ascii_lowercase().as_str() {
        "succeeded" => IntentStatus::Succeeded,
        "canceled" | "cancelled" => IntentStatus::Cancelled,
        "requires_payment_method" | "requires_confirmation" | "requires_action" => {
            IntentStatus::RequiresConfirmation
        }
        "failed" | "payment_failed" => IntentStatus::Failed,
        _ => IntentStatus::Processing,
    }
}

// =============================================================================
// Webhooks
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("malformed signature header")]
    MalformedHeader,

    #[error("signature mismatch")]
    InvalidSignature,

    #[error("timestamp outside tolerance")]
    StaleTimestamp,

    #[error("malformed event payload")]
    MalformedPayload,
}

/// A webhook event after signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    PaymentSucceeded { intent_id: String },
    PaymentFailed { intent_id: String },
    PaymentCancelled { intent_id: String },
    Unhandled { event_type: String },
}

/// Verify a webhook delivery and parse its event.
///
/// `signature_header` carries `t=<unix>,v1=<hex hmac>`; the MAC is computed
/// over `"{t}.{raw_body}"` with the endpoint secret. `now` is the receiver's
/// clock, injected for testability.
pub fn verify_webhook_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: i64,
) -> Result<PaymentEvent, WebhookError> {
    let (timestamp, signature) = parse_signature_header(signature_header)?;

    if (now - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(WebhookError::StaleTimestamp);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.verify_slice(&signature)
        .map_err(|_| WebhookError::InvalidSignature)?;

    parse_event(payload)
}

fn parse_signature_header(header: &str) -> Result<(i64, Vec<u8>), WebhookError> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => signature = alloy::hex::decode(value).ok(),
            _ => {}
        }
    }
    match (timestamp, signature) {
        (Some(t), Some(sig)) => Ok((t, sig)),
        _ => Err(WebhookError::MalformedHeader),
    }
}

fn parse_event(payload: &[u8]) -> Result<PaymentEvent, WebhookError> {
    let body: Value =
        serde_json::from_slice(payload).map_err(|_| WebhookError::MalformedPayload)?;
    let event_type = body
        .get("type")
        .and_then(Value::as_str)
        .ok_or(WebhookError::MalformedPayload)?;

    let intent_id = || {
        body.pointer("/data/object/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(WebhookError::MalformedPayload)
    };

    match event_type {
        "payment_intent.succeeded" => Ok(PaymentEvent::PaymentSucceeded {
            intent_id: intent_id()?,
        }),
        "payment_intent.payment_failed" => Ok(PaymentEvent::PaymentFailed {
            intent_id: intent_id()?,
        }),
        "payment_intent.canceled" => Ok(PaymentEvent::PaymentCancelled {
            intent_id: intent_id()?,
        }),
        other => Ok(PaymentEvent::Unhandled {
            event_type: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let digest = mac.finalize().into_bytes();
        format!("t={timestamp},v1={}", alloy::hex::encode(digest))
    }

    fn succeeded_payload(intent: &str) -> Vec<u8> {
        format!(
            r#"{{"type":"payment_intent.succeeded","data":{{"object":{{"id":"{intent}"}}}}}}"#
        )
        .into_bytes()
    }

    #[test]
    fn accepts_a_correctly_signed_event() {
        let now = 1_700_000_000;
        let payload = succeeded_payload("pi_123");
        let header = sign(SECRET, now, &payload);

        let event = verify_webhook_signature(SECRET, &payload, &header, now).unwrap();
        assert_eq!(
            event,
            PaymentEvent::PaymentSucceeded {
                intent_id: "pi_123".to_string()
            }
        );
    }

    #[test]
    fn rejects_a_tampered_body() {
        let now = 1_700_000_000;
        let payload = succeeded_payload("pi_123");
        let header = sign(SECRET, now, &payload);

        let tampered = succeeded_payload("pi_456");
        assert_eq!(
            verify_webhook_signature(SECRET, &tampered, &header, now),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_the_wrong_secret() {
        let now = 1_700_000_000;
        let payload = succeeded_payload("pi_123");
        let header = sign("whsec_other", now, &payload);

        assert_eq!(
            verify_webhook_signature(SECRET, &payload, &header, now),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let now = 1_700_000_000;
        let stale = now - WEBHOOK_TOLERANCE_SECS - 1;
        let payload = succeeded_payload("pi_123");
        let header = sign(SECRET, stale, &payload);

        assert_eq!(
            verify_webhook_signature(SECRET, &payload, &header, now),
            Err(WebhookError::StaleTimestamp)
        );
    }

    #[test]
    fn rejects_a_malformed_header() {
        let payload = succeeded_payload("pi_123");
        assert_eq!(
            verify_webhook_signature(SECRET, &payload, "v1=zz", 0),
            Err(WebhookError::MalformedHeader)
        );
        assert_eq!(
            verify_webhook_signature(SECRET, &payload, "", 0),
            Err(WebhookError::MalformedHeader)
        );
    }

    #[test]
    fn parses_failure_and_unknown_events() {
        let now = 1_700_000_000;
        let payload = br#"{"type":"payment_intent.payment_failed","data":{"object":{"id":"pi_9"}}}"#;
        let header = sign(SECRET, now, payload);
        let event = verify_webhook_signature(SECRET, payload, &header, now).unwrap();
        assert_eq!(
            event,
            PaymentEvent::PaymentFailed {
                intent_id: "pi_9".to_string()
            }
        );

        let payload = br#"{"type":"payment_intent.canceled","data":{"object":{"id":"pi_10"}}}"#;
        let header = sign(SECRET, now, payload);
        let event = verify_webhook_signature(SECRET, payload, &header, now).unwrap();
        assert_eq!(
            event,
            PaymentEvent::PaymentCancelled {
                intent_id: "pi_10".to_string()
            }
        );

        let payload = br#"{"type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#;
        let header = sign(SECRET, now, payload);
        let event = verify_webhook_signature(SECRET, payload, &header, now).unwrap();
        assert_eq!(
            event,
            PaymentEvent::Unhandled {
                event_type: "charge.refunded".to_string()
            }
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(map_intent_status("succeeded"), IntentStatus::Succeeded);
        assert_eq!(map_intent_status("SUCCEEDED"), IntentStatus::Succeeded);
        assert_eq!(map_intent_status("canceled"), IntentStatus::Cancelled);
        assert_eq!(
            map_intent_status("requires_action"),
            IntentStatus::RequiresConfirmation
        );
        assert_eq!(map_intent_status("payment_failed"), IntentStatus::Failed);
        assert_eq!(map_intent_status("processing"), IntentStatus::Processing);
        assert_eq!(map_intent_status("something_new"), IntentStatus::Processing);
    }
}
