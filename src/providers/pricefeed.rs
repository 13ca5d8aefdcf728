// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! Asset price feed with a short-lived cache.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::config::{self, env_or_default};
use crate::error::ServiceError;

const DEFAULT_API_BASE_URL: &str = "https://api.coinbase.com";

const PRICE_CACHE_CAPACITY: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("price feed request failed: {0}")]
    Request(String),

    #[error("price feed response was invalid: {0}")]
    InvalidResponse(String),
}

impl From<PriceError> for ServiceError {
    fn from(err: PriceError) -> Self {
        ServiceError::ExternalService(err.to_string())
    }
}

/// A USD spot price at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    /// USD per whole asset unit.
    pub value: Decimal,
    pub fetched_at: Instant,
}

/// Source of USD spot prices.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn latest_price(&self, symbol: &str) -> Result<PriceQuote, PriceError>;
}

/// Spot price client (Coinbase-compatible public API).
#[derive(Debug, Clone)]
pub struct PriceFeedClient {
    base_url: String,
    http: Client,
}

#[derive(Deserialize)]
struct SpotPriceResponse {
    data: SpotPriceData,
}

#[derive(Deserialize)]
struct SpotPriceData {
    amount: String,
}

impl PriceFeedClient {
    pub fn from_env() -> Result<Self, PriceError> {
        let base_url = env_or_default("PRICE_API_BASE_URL", DEFAULT_API_BASE_URL);
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PriceError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { base_url, http })
    }
}

#[async_trait]
impl PriceSource for PriceFeedClient {
    async fn latest_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        let url = format!(
            "{}/v2/prices/{}-USD/spot",
            self.base_url,
            symbol.to_ascii_uppercase()
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PriceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PriceError::Request(format!(
                "spot price returned {}",
                response.status()
            )));
        }

        let body: SpotPriceResponse = response
            .json()
            .await
            .map_err(|e| PriceError::InvalidResponse(e.to_string()))?;
        let value: Decimal = body
            .data
            .amount
            .parse()
            .map_err(|_| PriceError::InvalidResponse(format!("bad amount {}", body.data.amount)))?;
        if value <= Decimal::ZERO {
            return Err(PriceError::InvalidResponse(format!(
                "non-positive price {value}"
            )));
        }

        Ok(PriceQuote {
            value,
            fetched_at: Instant::now(),
        })
    }
}

/// Caching wrapper that bounds how often the upstream feed is hit.
///
/// Quotes are reused until their age exceeds the TTL. Misses and expiries
/// fall through to the inner source.
pub struct CachedPriceSource {
    inner: Arc<dyn PriceSource>,
    cache: Mutex<LruCache<String, PriceQuote>>,
    ttl: Duration,
}

impl CachedPriceSource {
    pub fn new(inner: Arc<dyn PriceSource>) -> Self {
        Self::with_ttl(inner, Duration::from_secs(config::PRICE_CACHE_TTL_SECS))
    }

    pub fn with_ttl(inner: Arc<dyn PriceSource>, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(PRICE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }
}

#[async_trait]
impl PriceSource for CachedPriceSource {
    async fn latest_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        let key = symbol.to_ascii_uppercase();
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(quote) = cache.get(&key) {
                if quote.fetched_at.elapsed() < self.ttl {
                    debug!(symbol = %key, "price cache hit");
                    return Ok(*quote);
                }
            }
        }

        let quote = self.inner.latest_price(&key).await?;
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(key, quote);
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PriceSource for CountingSource {
        async fn latest_price(&self, _symbol: &str) -> Result<PriceQuote, PriceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(PriceQuote {
                value: Decimal::from(n as u64 * 1000),
                fetched_at: Instant::now(),
            })
        }
    }

    #[tokio::test]
    async fn fresh_quotes_are_served_from_cache() {
        let source = CountingSource::new();
        let cached = CachedPriceSource::with_ttl(source.clone(), Duration::from_secs(30));

        let first = cached.latest_price("btc").await.unwrap();
        let second = cached.latest_price("BTC").await.unwrap();
        assert_eq!(first.value, second.value);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_quotes_are_refetched() {
        let source = CountingSource::new();
        let cached = CachedPriceSource::with_ttl(source.clone(), Duration::from_millis(0));

        cached.latest_price("BTC").await.unwrap();
        std::thread::sleep(Duration::from_millis(5));
        cached.latest_price("BTC").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn symbols_are_cached_independently() {
        let source = CountingSource::new();
        let cached = CachedPriceSource::with_ttl(source.clone(), Duration::from_secs(30));

        cached.latest_price("BTC").await.unwrap();
        cached.latest_price("ETH").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
