//! Per-signal monitoring task
//!
//! Polls the feed on a fixed cadence and races the polling loop against the
//! signal's monitoring deadline. Whichever finishes first resolves the signal.

use std::sync::{Arc, PoisonError};
use tokio::time::{interval, timeout, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::{SignalSlot, SignalTracker};
use crate::types::ExitReason;

/// Lookups in a row without a usable price before the task warns
const OUTAGE_WARN_TICKS: u32 = 5;

pub(super) async fn run(tracker: Arc<SignalTracker>, slot: Arc<SignalSlot>, deadline: Instant) {
    let id = slot.id.clone();

    match timeout_at(deadline, poll_until_crossed(&tracker, &slot)).await {
        Ok(Some((price, reason))) => {
            tracker.resolve(&id, price, reason);
        }
        // Resolved elsewhere
        Ok(None) => {}
        Err(_) => {
            let last_price = slot
                .signal
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .last_price;
            debug!(signal_id = %id, last_price, "⏰ [MONITOR] Monitoring horizon reached");
            tracker.resolve(&id, last_price, ExitReason::Timeout);
        }
    }
}

/// Returns the crossing price and level, or `None` once the signal is no
/// longer monitoring.
async fn poll_until_crossed(
    tracker: &SignalTracker,
    slot: &SignalSlot,
) -> Option<(f64, ExitReason)> {
    let config = tracker.config();
    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut missed = 0u32;

    loop {
        ticker.tick().await;

        let price = match timeout(config.price_timeout, tracker.feed().get_price(&slot.symbol))
            .await
        {
            Ok(Ok(Some(p))) if p.is_finite() && p > 0.0 => Some(p),
            Ok(Ok(Some(p))) => {
                debug!(signal_id = %slot.id, symbol = %slot.symbol, price = p, "Ignoring unusable price");
                None
            }
            Ok(Ok(None)) => {
                debug!(signal_id = %slot.id, symbol = %slot.symbol, "No price available");
                None
            }
            Ok(Err(e)) => {
                debug!(signal_id = %slot.id, symbol = %slot.symbol, error = %e, "Price lookup failed");
                None
            }
            Err(_) => {
                debug!(
                    signal_id = %slot.id,
                    symbol = %slot.symbol,
                    timeout_ms = config.price_timeout.as_millis() as u64,
                    "Price lookup timed out"
                );
                None
            }
        };

        let Some(price) = price else {
            missed += 1;
            if missed == OUTAGE_WARN_TICKS {
                warn!(
                    signal_id = %slot.id,
                    symbol = %slot.symbol,
                    feed = tracker.feed().name(),
                    ticks = missed,
                    "⚠️ [MONITOR] Price source unavailable, still monitoring"
                );
            }
            continue;
        };
        missed = 0;

        let crossed = {
            let mut signal = slot.signal.lock().unwrap_or_else(PoisonError::into_inner);
            if !signal.is_active() {
                return None;
            }
            signal.observe(price)
        };

        if let Some(reason) = crossed {
            return Some((price, reason));
        }
    }
}
