// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Deposit workflow: card funding via the payment processor.
//!
//! A deposit is created PENDING against a processor payment intent and is
//! credited exactly once, either by the synchronous confirm call or by the
//! asynchronous webhook, whichever reaches the ledger first. The losing
//! path observes an already-completed deposit and no-ops.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::error::ServiceError;
use crate::ledger::{DepositStatus, LedgerDb, SettlementOutcome, StoredDeposit};
use crate::providers::{IntentStatus, PaymentEvent, PaymentGateway};

/// Outcome of a confirm call: the deposit in its post-confirmation state
/// plus the fiat balance, and the crediting transaction when one exists.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DepositConfirmation {
    pub deposit: StoredDeposit,
    /// Fiat balance after confirmation.
    pub balance: Decimal,
    /// Ledger transaction that credited the deposit; absent when the
    /// payment did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<u64>,
}

pub struct DepositWorkflow {
    ledger: Arc<LedgerDb>,
    gateway: Arc<dyn PaymentGateway>,
}

impl DepositWorkflow {
    pub fn new(ledger: Arc<LedgerDb>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { ledger, gateway }
    }

    /// Create a deposit: open a payment intent upstream, then persist the
    /// PENDING record keyed by the intent ID.
    pub async fn create(
        &self,
        user_id: u64,
        amount: Decimal,
        currency: &str,
        metadata: Option<Value>,
    ) -> Result<StoredDeposit, ServiceError> {
        validate_amount(amount)?;
        let currency = validate_currency(currency)?;

        let amount_minor = (amount * Decimal::from(100))
            .to_u64()
            .ok_or_else(|| ServiceError::Validation("Amount out of range".to_string()))?;

        let intent = self
            .gateway
            .create_intent(amount_minor, &currency, user_id)
            .await?;

        let deposit = StoredDeposit::new_pending(
            user_id,
            intent.id,
            amount,
            currency,
            intent.client_secret,
            metadata,
        );
        self.ledger.create_deposit(&deposit)?;

        info!(
            user_id,
            intent_id = %deposit.payment_intent_id,
            amount = %amount,
            "deposit created"
        );
        Ok(deposit)
    }

    /// Confirm a deposit with the processor and settle it on success.
    ///
    /// Returns the deposit in its post-confirmation state together with the
    /// resulting balance and crediting transaction. A deposit that already
    /// reached a terminal state is a conflict; a payment still in flight
    /// upstream reads as a retryable external failure.
    pub async fn confirm(
        &self,
        user_id: u64,
        intent_id: &str,
        payment_method_ref: &str,
    ) -> Result<DepositConfirmation, ServiceError> {
        let payment_method_ref = payment_method_ref.trim();
        if payment_method_ref.is_empty() {
            return Err(ServiceError::Validation(
                "payment_method_ref must not be empty".to_string(),
            ));
        }

        let deposit = self
            .ledger
            .get_deposit(intent_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("Deposit {intent_id} not found")))?;
        if deposit.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "Deposit belongs to another user".to_string(),
            ));
        }
        if deposit.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "Deposit {intent_id} is already settled"
            )));
        }

        let status = self
            .gateway
            .confirm_intent(intent_id, payment_method_ref)
            .await?;
        match status {
            IntentStatus::Succeeded => self.settle(intent_id).await,
            IntentStatus::Failed | IntentStatus::Cancelled => {
                let terminal = if status == IntentStatus::Cancelled {
                    DepositStatus::Cancelled
                } else {
                    DepositStatus::Failed
                };
                self.ledger.mark_deposit_terminal(intent_id, terminal)?;
                info!(intent_id, "deposit confirmation failed upstream");
                self.confirmation(intent_id).await
            }
            IntentStatus::Processing | IntentStatus::RequiresConfirmation => {
                Err(ServiceError::ExternalService(
                    "Payment is still processing, retry shortly".to_string(),
                ))
            }
        }
    }

    /// Apply a verified webhook event.
    ///
    /// Events for unknown intents and duplicate deliveries are acknowledged
    /// without effect.
    pub async fn apply_event(&self, event: PaymentEvent) -> Result<(), ServiceError> {
        match event {
            PaymentEvent::PaymentSucceeded { intent_id } => {
                match self.ledger.settle_deposit(&intent_id)? {
                    SettlementOutcome::Credited { receipt, .. } => {
                        info!(
                            intent_id = %intent_id,
                            transaction_id = receipt.transaction_id,
                            "deposit credited via webhook"
                        );
                    }
                    SettlementOutcome::AlreadyCompleted => {
                        debug!(intent_id = %intent_id, "webhook for settled deposit, ignoring");
                    }
                    SettlementOutcome::TerminalFailure => {
                        warn!(intent_id = %intent_id, "success webhook for failed deposit");
                    }
                    SettlementOutcome::NotFound => {
                        warn!(intent_id = %intent_id, "webhook for unknown intent");
                    }
                }
                Ok(())
            }
            PaymentEvent::PaymentFailed { intent_id } => {
                if self
                    .ledger
                    .mark_deposit_terminal(&intent_id, DepositStatus::Failed)?
                {
                    info!(intent_id = %intent_id, "deposit marked failed via webhook");
                }
                Ok(())
            }
            PaymentEvent::PaymentCancelled { intent_id } => {
                if self
                    .ledger
                    .mark_deposit_terminal(&intent_id, DepositStatus::Cancelled)?
                {
                    info!(intent_id = %intent_id, "deposit marked cancelled via webhook");
                }
                Ok(())
            }
            PaymentEvent::Unhandled { event_type } => {
                debug!(event_type = %event_type, "ignoring unhandled webhook event");
                Ok(())
            }
        }
    }

    /// List the caller's deposits, newest first.
    pub fn list(&self, user_id: u64) -> Result<Vec<StoredDeposit>, ServiceError> {
        Ok(self.ledger.list_deposits(user_id)?)
    }

    async fn settle(&self, intent_id: &str) -> Result<DepositConfirmation, ServiceError> {
        match self.ledger.settle_deposit(intent_id)? {
            SettlementOutcome::Credited { receipt, deposit } => {
                info!(
                    intent_id,
                    transaction_id = receipt.transaction_id,
                    balance = %receipt.balance,
                    "deposit credited"
                );
                Ok(DepositConfirmation {
                    transaction_id: Some(receipt.transaction_id),
                    balance: receipt.balance,
                    deposit,
                })
            }
            // The webhook settled it first; the money is there either way
            SettlementOutcome::AlreadyCompleted => self.confirmation(intent_id).await,
            SettlementOutcome::TerminalFailure => Err(ServiceError::Conflict(format!(
                "Deposit {intent_id} already failed"
            ))),
            SettlementOutcome::NotFound => Err(ServiceError::NotFound(format!(
                "Deposit {intent_id} not found"
            ))),
        }
    }

    /// Assemble a confirmation view from the stored deposit and the owner's
    /// current balance.
    async fn confirmation(&self, intent_id: &str) -> Result<DepositConfirmation, ServiceError> {
        let deposit = self
            .ledger
            .get_deposit(intent_id)?
            .ok_or_else(|| ServiceError::NotFound(format!("Deposit {intent_id} not found")))?;
        let owner = self.ledger.get_user(deposit.user_id)?.ok_or_else(|| {
            ServiceError::Internal(format!("deposit {intent_id} owner missing"))
        })?;
        Ok(DepositConfirmation {
            transaction_id: deposit.transaction_id,
            balance: owner.balance,
            deposit,
        })
    }
}

fn validate_amount(amount: Decimal) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::Validation(
            "Amount must be positive".to_string(),
        ));
    }
    if amount.scale() > 2 {
        return Err(ServiceError::Validation(
            "Amount supports at most 2 decimal places".to_string(),
        ));
    }
    Ok(())
}

fn validate_currency(currency: &str) -> Result<String, ServiceError> {
    let currency = currency.trim().to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ServiceError::Validation(
            "Currency must be a 3-letter code".to_string(),
        ));
    }
    Ok(currency)
}
