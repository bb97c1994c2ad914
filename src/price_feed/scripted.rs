//! Deterministic feed that replays a fixed sequence of answers per symbol

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{normalize_symbol, PriceFeed};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Price(f64),
    Missing,
    Fail,
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<Step>,
    /// Replayed once the script is exhausted
    last: Option<Step>,
    delay: Option<Duration>,
    calls: usize,
}

/// Replays per-symbol answers in order.
///
/// When a symbol's script runs out the last answer repeats, so a script of
/// `[100.0]` holds the price flat forever. Unknown symbols answer `None`.
#[derive(Debug, Default)]
pub struct ScriptedFeed {
    scripts: Mutex<HashMap<String, Script>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, symbol: &str, step: Step) {
        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        scripts
            .entry(normalize_symbol(symbol))
            .or_default()
            .steps
            .push_back(step);
    }

    /// Queue prices for `symbol`
    pub fn with_prices(self, symbol: &str, prices: &[f64]) -> Self {
        for &p in prices {
            self.push(symbol, Step::Price(p));
        }
        self
    }

    /// Queue `n` ticks with no price
    pub fn with_outage(self, symbol: &str, n: usize) -> Self {
        for _ in 0..n {
            self.push(symbol, Step::Missing);
        }
        self
    }

    /// Queue `n` failing lookups
    pub fn with_errors(self, symbol: &str, n: usize) -> Self {
        for _ in 0..n {
            self.push(symbol, Step::Fail);
        }
        self
    }

    /// Delay every answer for `symbol`
    pub fn with_delay(self, symbol: &str, delay: Duration) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
            scripts.entry(normalize_symbol(symbol)).or_default().delay = Some(delay);
        }
        self
    }

    /// Lookups made for `symbol` so far
    pub fn calls(&self, symbol: &str) -> usize {
        let scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        scripts
            .get(&normalize_symbol(symbol))
            .map(|s| s.calls)
            .unwrap_or(0)
    }

    /// Pop the next step without holding the lock across the delay
    fn next_step(&self, symbol: &str) -> (Option<Step>, Option<Duration>) {
        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(script) = scripts.get_mut(&normalize_symbol(symbol)) else {
            return (None, None);
        };
        script.calls += 1;
        let step = match script.steps.pop_front() {
            Some(step) => {
                script.last = Some(step);
                Some(step)
            }
            None => script.last,
        };
        (step, script.delay)
    }
}

#[async_trait]
impl PriceFeed for ScriptedFeed {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn get_price(&self, symbol: &str) -> Result<Option<f64>> {
        let (step, delay) = self.next_step(symbol);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match step {
            Some(Step::Price(p)) => Ok(Some(p)),
            Some(Step::Missing) | None => Ok(None),
            Some(Step::Fail) => bail!("scripted lookup failure for {}", symbol),
        }
    }
}
