//! Signal Tracker
//!
//! Owns the table of signals that are still monitoring. Each entry gets its
//! own tokio task (see `monitor`) that resolves it exactly once, moves it to
//! the outcome store, fires the caller's callback and broadcasts the outcome.

mod monitor;

use chrono::Utc;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

use crate::error::{Result, TrackerError};
use crate::price_feed::{normalize_symbol, PriceFeed};
use crate::stats::{StatsReport, WinRate};
use crate::store::OutcomeStore;
use crate::targets::{TargetCalculator, TargetConfig};
use crate::types::{ExitReason, SignalEntry, SignalOutcome, TrackedSignal};

/// Invoked once with the outcome when a signal resolves
pub type OutcomeCallback = Box<dyn FnOnce(SignalOutcome) + Send + 'static>;

/// Tracker timing and target parameters
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Delay between price lookups
    pub poll_interval: Duration,
    /// Horizon after which a signal resolves on its last price
    pub monitoring_duration: Duration,
    /// Upper bound on a single price lookup
    pub price_timeout: Duration,
    pub outcome_channel_capacity: usize,
    pub targets: TargetConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            monitoring_duration: Duration::from_secs(120),
            price_timeout: Duration::from_secs(2),
            outcome_channel_capacity: 256,
            targets: TargetConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// Reject timings the monitoring loop cannot run with, and target
    /// parameters that would break level ordering.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(TrackerError::InvalidInput(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.monitoring_duration.is_zero() {
            return Err(TrackerError::InvalidInput(
                "monitoring_duration must be greater than zero".to_string(),
            ));
        }
        if self.price_timeout.is_zero() {
            return Err(TrackerError::InvalidInput(
                "price_timeout must be greater than zero".to_string(),
            ));
        }
        self.targets.validate()
    }
}

/// One monitored signal. The mutex guards the record; the resolving path
/// takes the callback out exactly once.
pub(crate) struct SignalSlot {
    id: String,
    symbol: String,
    signal: Mutex<TrackedSignal>,
    callback: Mutex<Option<OutcomeCallback>>,
    task: Mutex<Option<AbortHandle>>,
}

impl SignalSlot {
    fn new(signal: TrackedSignal, callback: Option<OutcomeCallback>) -> Self {
        Self {
            id: signal.id.clone(),
            symbol: signal.symbol.clone(),
            signal: Mutex::new(signal),
            callback: Mutex::new(callback),
            task: Mutex::new(None),
        }
    }

    fn snapshot(&self) -> TrackedSignal {
        self.signal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn abort_task(&self) {
        if let Some(handle) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

/// Tracks signals from entry to resolution
pub struct SignalTracker {
    config: TrackerConfig,
    calculator: TargetCalculator,
    feed: Arc<dyn PriceFeed>,
    store: Arc<OutcomeStore>,
    active: Mutex<HashMap<String, Arc<SignalSlot>>>,
    outcomes_tx: broadcast::Sender<SignalOutcome>,
    /// Serializes snapshot writes
    persist_lock: Mutex<()>,
    shutting_down: AtomicBool,
}

impl SignalTracker {
    /// Build a tracker. Fails if `config` does not pass
    /// [`TrackerConfig::validate`].
    pub fn new(
        config: TrackerConfig,
        feed: Arc<dyn PriceFeed>,
        store: Arc<OutcomeStore>,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        let (outcomes_tx, _) = broadcast::channel(config.outcome_channel_capacity.max(1));
        info!(
            feed = feed.name(),
            poll_ms = config.poll_interval.as_millis() as u64,
            horizon_secs = config.monitoring_duration.as_secs(),
            "🎯 [TRACKER] Signal tracker initialized"
        );
        Ok(Arc::new(Self {
            calculator: TargetCalculator::new(config.targets.clone()),
            config,
            feed,
            store,
            active: Mutex::new(HashMap::new()),
            outcomes_tx,
            persist_lock: Mutex::new(()),
            shutting_down: AtomicBool::new(false),
        }))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn feed(&self) -> &Arc<dyn PriceFeed> {
        &self.feed
    }

    pub fn store(&self) -> &Arc<OutcomeStore> {
        &self.store
    }

    /// Start tracking a signal.
    ///
    /// Computes its targets, registers it as MONITORING and spawns its
    /// monitoring task. Must be called from within a tokio runtime.
    pub fn record_entry(
        self: &Arc<Self>,
        entry: SignalEntry,
        on_outcome: Option<OutcomeCallback>,
    ) -> Result<TrackedSignal> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(TrackerError::ShuttingDown);
        }

        let mut entry = entry;
        entry.id = entry.id.trim().to_string();
        entry.symbol = normalize_symbol(&entry.symbol);
        if entry.id.is_empty() {
            return Err(TrackerError::InvalidInput("signal id is empty".to_string()));
        }
        if entry.symbol.is_empty() {
            return Err(TrackerError::InvalidInput("symbol is empty".to_string()));
        }

        let targets = self.calculator.compute(
            entry.entry_price,
            entry.direction,
            entry.confidence,
            entry.volatility,
        )?;
        let signal = TrackedSignal::new(&entry, targets, Utc::now());
        let slot = Arc::new(SignalSlot::new(signal.clone(), on_outcome));

        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if active.contains_key(&entry.id) || self.store.contains(&entry.id) {
                return Err(TrackerError::AlreadyTracked(entry.id));
            }
            active.insert(entry.id.clone(), slot.clone());
        }

        let deadline = tokio::time::Instant::now() + self.config.monitoring_duration;
        let handle = tokio::spawn(monitor::run(self.clone(), slot.clone(), deadline));
        *slot.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle.abort_handle());

        info!(
            signal_id = %signal.id,
            symbol = %signal.symbol,
            direction = %signal.direction,
            entry = signal.entry_price,
            tp1 = signal.targets.tp1,
            tp2 = signal.targets.tp2,
            tp3 = signal.targets.tp3,
            stop = signal.targets.stop_loss,
            "🎯 [TRACKER] Signal recorded"
        );

        self.persist_logged();
        Ok(signal)
    }

    /// Move a signal to its terminal state.
    ///
    /// Returns `None` if the id is unknown or the signal already resolved, in
    /// which case nothing changes and no callback fires.
    pub(crate) fn resolve(
        &self,
        id: &str,
        exit_price: f64,
        reason: ExitReason,
    ) -> Option<SignalOutcome> {
        let slot = {
            let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.get(id).cloned()
        }?;

        let resolved = {
            let mut signal = slot.signal.lock().unwrap_or_else(PoisonError::into_inner);
            if !signal.settle(exit_price, reason, Utc::now()) {
                return None;
            }
            signal.clone()
        };

        // History first, so the id is never absent from both tables.
        self.store.record(resolved.clone());
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.remove(id);
        }
        slot.abort_task();

        let outcome = SignalOutcome::from_signal(&resolved)?;
        info!(
            signal_id = %outcome.signal_id,
            symbol = %outcome.symbol,
            outcome = %outcome.outcome,
            reason = %outcome.exit_reason,
            exit = outcome.exit_price,
            return_pct = %format!("{:+.2}%", outcome.return_pct),
            hold_ms = outcome.hold_duration_ms,
            "🏁 [TRACKER] Signal resolved"
        );

        let callback = slot
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            let payload = outcome.clone();
            if catch_unwind(AssertUnwindSafe(move || callback(payload))).is_err() {
                error!(signal_id = %outcome.signal_id, "🎯 [TRACKER] Outcome callback panicked");
            }
        }

        // No subscribers is fine.
        let _ = self.outcomes_tx.send(outcome.clone());

        self.persist_logged();
        Some(outcome)
    }

    /// Current record for `id`, monitoring or resolved
    pub fn get_status(&self, id: &str) -> Option<TrackedSignal> {
        let slot = {
            let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.get(id).cloned()
        };
        match slot {
            Some(slot) => Some(slot.snapshot()),
            None => self.store.get(id),
        }
    }

    /// Signals still monitoring, oldest entry first
    pub fn get_active_signals(&self) -> Vec<TrackedSignal> {
        let slots: Vec<Arc<SignalSlot>> = {
            let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.values().cloned().collect()
        };
        let mut signals: Vec<TrackedSignal> = slots
            .iter()
            .map(|slot| slot.snapshot())
            .filter(|s| s.is_active())
            .collect();
        signals.sort_by(|a, b| a.entry_time.cmp(&b.entry_time).then_with(|| a.id.cmp(&b.id)));
        signals
    }

    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Resolved signals, newest first
    pub fn get_completed_signals(&self, limit: Option<usize>) -> Vec<TrackedSignal> {
        self.store.completed(limit)
    }

    /// Lifetime win rate. Read-only.
    pub fn win_rate(&self) -> WinRate {
        self.store.win_rate()
    }

    pub fn stats_report(&self) -> StatsReport {
        self.store.report(self.active_count())
    }

    /// Outcomes as they resolve. Slow receivers may lag and miss some.
    pub fn subscribe(&self) -> broadcast::Receiver<SignalOutcome> {
        self.outcomes_tx.subscribe()
    }

    /// Write the current snapshot (active table and history)
    pub fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let active = self.get_active_signals();
        self.store.save(&active)
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            warn!(error = %e, "💾 [TRACKER] Failed to persist state");
        }
    }

    fn drain_active(&self) -> Vec<Arc<SignalSlot>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.drain().map(|(_, slot)| slot).collect()
    }

    /// Cancel every monitoring task and forget all signals and statistics.
    /// No callbacks fire for cancelled signals.
    pub fn reset(&self) {
        let slots = self.drain_active();
        for slot in &slots {
            slot.abort_task();
        }
        self.store.clear();
        info!(cancelled = slots.len(), "🔄 [TRACKER] Tracker reset");
        self.persist_logged();
    }

    /// Stop accepting entries, cancel monitoring and write a final snapshot.
    /// Signals still monitoring are saved as active.
    pub fn shutdown(&self) -> Result<()> {
        self.shutting_down.store(true, Ordering::SeqCst);

        let slots: Vec<Arc<SignalSlot>> = {
            let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.values().cloned().collect()
        };
        for slot in &slots {
            slot.abort_task();
        }

        let result = self.persist();
        self.drain_active();
        info!(
            abandoned = slots.len(),
            resolved = self.store.win_rate().total_signals,
            "🛑 [TRACKER] Tracker shut down"
        );
        result
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}
