//! Random-walk feed for paper runs without exchange access

use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{normalize_symbol, PriceFeed};

struct WalkState {
    rng: StdRng,
    prices: HashMap<String, f64>,
}

/// Each lookup moves the symbol's price by a uniform step in
/// `[-step_pct, +step_pct]`. Symbols start at `start_price`.
pub struct SimulatedFeed {
    start_price: f64,
    step_pct: f64,
    state: Mutex<WalkState>,
}

impl SimulatedFeed {
    pub fn new(start_price: f64, step_pct: f64) -> Self {
        Self::with_rng(start_price, step_pct, StdRng::from_entropy())
    }

    /// Reproducible walk
    pub fn with_seed(start_price: f64, step_pct: f64, seed: u64) -> Self {
        Self::with_rng(start_price, step_pct, StdRng::seed_from_u64(seed))
    }

    fn with_rng(start_price: f64, step_pct: f64, rng: StdRng) -> Self {
        Self {
            start_price,
            step_pct: step_pct.abs(),
            state: Mutex::new(WalkState {
                rng,
                prices: HashMap::new(),
            }),
        }
    }

    /// Pin a symbol's current price, e.g. to the entry price of a signal
    pub fn set_price(&self, symbol: &str, price: f64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.prices.insert(normalize_symbol(symbol), price);
    }
}

#[async_trait]
impl PriceFeed for SimulatedFeed {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn get_price(&self, symbol: &str) -> Result<Option<f64>> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;
        let step = if self.step_pct > 0.0 {
            state.rng.gen_range(-self.step_pct..=self.step_pct)
        } else {
            0.0
        };
        let price = state
            .prices
            .entry(normalize_symbol(symbol))
            .or_insert(self.start_price);
        *price = (*price * (1.0 + step)).max(f64::MIN_POSITIVE);
        Ok(Some(*price))
    }
}
