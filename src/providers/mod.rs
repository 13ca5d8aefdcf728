// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! External service integrations: the card-payment processor and the
//! asset price feed.

pub mod payments;
pub mod pricefeed;

pub use payments::{
    verify_webhook_signature, IntentStatus, PaymentApiClient, PaymentError, PaymentEvent,
    PaymentGateway, PaymentIntent, WebhookError,
};
pub use pricefeed::{CachedPriceSource, PriceError, PriceFeedClient, PriceQuote, PriceSource};
