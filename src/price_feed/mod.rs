//! Price feed module - latest-price lookups consumed by the tracker
//!
//! The tracker only needs `get_price(symbol)`; where the number comes from is
//! up to the adapter:
//! - `BinanceRestFeed`: one REST call per lookup
//! - `BinanceStreamFeed` + `PriceCache`: miniTicker stream into a staleness-bounded cache
//! - `SimulatedFeed`: random walk for paper runs
//! - `ScriptedFeed`: fixed answers for tests and replays

mod binance;
mod scripted;
mod simulated;

pub use binance::{BinanceRestFeed, BinanceStreamFeed};
pub use scripted::ScriptedFeed;
pub use simulated::SimulatedFeed;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Source of the latest traded price for a symbol.
///
/// `Ok(None)` means "no price right now"; the tracker treats it exactly like
/// an error and skips the tick. Implementations are called concurrently from
/// many monitoring tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Feed name for logs
    fn name(&self) -> &'static str;

    /// Latest price for `symbol`
    async fn get_price(&self, symbol: &str) -> Result<Option<f64>>;
}

/// Normalize user-supplied symbols ("btcusdt " -> "BTCUSDT")
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Last price per symbol, pushed by a streaming source
#[derive(Debug)]
pub struct PriceCache {
    prices: RwLock<HashMap<String, (f64, i64)>>,
    /// Entries older than this are reported as unavailable
    staleness_ms: i64,
}

impl PriceCache {
    pub fn new(staleness_ms: u64) -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            staleness_ms: staleness_ms as i64,
        }
    }

    /// Store a price observed now
    pub fn update(&self, symbol: &str, price: f64) {
        self.update_at(symbol, price, Utc::now().timestamp_millis());
    }

    /// Store a price observed at `ts` (ms). Older updates never overwrite newer ones.
    pub fn update_at(&self, symbol: &str, price: f64, ts: i64) {
        if !price.is_finite() || price <= 0.0 {
            return;
        }
        let mut prices = self.prices.write().unwrap_or_else(PoisonError::into_inner);
        let slot = prices.entry(normalize_symbol(symbol)).or_insert((price, ts));
        if ts >= slot.1 {
            *slot = (price, ts);
        }
    }

    /// Fresh price for `symbol`, if any
    pub fn get(&self, symbol: &str) -> Option<f64> {
        let now = Utc::now().timestamp_millis();
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);
        prices
            .get(&normalize_symbol(symbol))
            .filter(|(_, ts)| now - ts <= self.staleness_ms)
            .map(|(price, _)| *price)
    }

    pub fn len(&self) -> usize {
        self.prices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PriceFeed for PriceCache {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn get_price(&self, symbol: &str) -> Result<Option<f64>> {
        Ok(self.get(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_normalizes_symbols() {
        let cache = PriceCache::new(10_000);
        cache.update("btcusdt ", 50_000.0);
        assert_eq!(cache.get("BTCUSDT"), Some(50_000.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_reports_stale_prices_as_missing() {
        let cache = PriceCache::new(5_000);
        let old = Utc::now().timestamp_millis() - 60_000;
        cache.update_at("ETHUSDT", 3_000.0, old);
        assert_eq!(cache.get("ETHUSDT"), None);
    }

    #[test]
    fn cache_ignores_out_of_order_and_invalid_updates() {
        let cache = PriceCache::new(60_000);
        let now = Utc::now().timestamp_millis();
        cache.update_at("SOLUSDT", 150.0, now);
        cache.update_at("SOLUSDT", 140.0, now - 1_000);
        cache.update_at("SOLUSDT", f64::NAN, now + 1);
        cache.update_at("SOLUSDT", -1.0, now + 2);
        assert_eq!(cache.get("SOLUSDT"), Some(150.0));
    }

    #[tokio::test]
    async fn cache_serves_as_price_feed() {
        let cache = PriceCache::new(10_000);
        cache.update("XRPUSDT", 0.5);
        let feed: &dyn PriceFeed = &cache;
        assert_eq!(feed.get_price("xrpusdt").await.unwrap(), Some(0.5));
        assert_eq!(feed.get_price("DOGEUSDT").await.unwrap(), None);
    }
}
