//! Outcome Store
//!
//! Bounded history of resolved signals plus lifetime totals, with a JSON
//! state snapshot and an optional daily CSV log.

mod csv_log;

pub use csv_log::{OutcomeCsvLog, OutcomeRecord};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::stats::{OutcomeTotals, StatsReport, WinRate};
use crate::types::TrackedSignal;

/// Snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable store state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    /// Signals still monitoring when the snapshot was taken
    #[serde(default)]
    pub active: Vec<TrackedSignal>,
    /// Resolved signals, oldest first
    #[serde(default)]
    pub history: Vec<TrackedSignal>,
    /// Missing in hand-written snapshots; rebuilt from history then
    #[serde(default)]
    pub totals: Option<OutcomeTotals>,
}

#[derive(Debug, Default)]
struct StoreState {
    history: VecDeque<TrackedSignal>,
    totals: OutcomeTotals,
}

/// Resolved-signal history. Oldest entries are evicted past `max_history`;
/// lifetime totals are kept separately and survive eviction.
pub struct OutcomeStore {
    max_history: usize,
    state: RwLock<StoreState>,
    state_file: Option<PathBuf>,
    csv_log: Option<OutcomeCsvLog>,
}

impl OutcomeStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            state: RwLock::new(StoreState::default()),
            state_file: None,
            csv_log: None,
        }
    }

    /// Persist snapshots to `path`
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    /// Append every resolution to a daily CSV
    pub fn with_csv_log(mut self, log: OutcomeCsvLog) -> Self {
        self.csv_log = Some(log);
        self
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn state_file(&self) -> Option<&PathBuf> {
        self.state_file.as_ref()
    }

    /// Add a resolved signal. Returns `false` for a signal that is still
    /// monitoring or an id already in history.
    pub fn record(&self, signal: TrackedSignal) -> bool {
        if signal.is_active() {
            warn!(signal_id = %signal.id, "💾 [STORE] Refusing to record unresolved signal");
            return false;
        }

        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.history.iter().any(|s| s.id == signal.id) {
                debug!(signal_id = %signal.id, "💾 [STORE] Duplicate resolution ignored");
                return false;
            }
            state.totals.record(&signal);
            state.history.push_back(signal.clone());
            while state.history.len() > self.max_history {
                state.history.pop_front();
            }
        }

        if let Some(log) = &self.csv_log {
            if let Some(record) = OutcomeRecord::from_signal(&signal) {
                if let Err(e) = log.append(&record) {
                    warn!(signal_id = %signal.id, error = %e, "💾 [STORE] Failed to append outcome CSV");
                }
            }
        }
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.history.iter().any(|s| s.id == id)
    }

    pub fn get(&self, id: &str) -> Option<TrackedSignal> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.history.iter().find(|s| s.id == id).cloned()
    }

    /// Resolved signals, newest first
    pub fn completed(&self, limit: Option<usize>) -> Vec<TrackedSignal> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let limit = limit.unwrap_or(state.history.len());
        state.history.iter().rev().take(limit).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.history.len()
    }

    /// Lifetime win rate
    pub fn win_rate(&self) -> WinRate {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.totals.win_rate()
    }

    pub fn totals(&self) -> OutcomeTotals {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.totals.clone()
    }

    pub fn report(&self, active_signals: usize) -> StatsReport {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let history: Vec<TrackedSignal> = state.history.iter().cloned().collect();
        StatsReport::build(&state.totals, &history, active_signals)
    }

    /// Drop history and totals
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.history.clear();
        state.totals = OutcomeTotals::default();
    }

    pub fn snapshot(&self, active: &[TrackedSignal]) -> StoreSnapshot {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            active: active.to_vec(),
            history: state.history.iter().cloned().collect(),
            totals: Some(state.totals.clone()),
        }
    }

    /// Write the snapshot to the state file (temp file + rename).
    /// No-op without a state file.
    pub fn save(&self, active: &[TrackedSignal]) -> Result<()> {
        let Some(state_file) = self.state_file.clone() else {
            return Ok(());
        };

        let snapshot = self.snapshot(active);
        let json = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = state_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = state_file.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &state_file)?;

        debug!(
            path = %state_file.display(),
            active = snapshot.active.len(),
            history = snapshot.history.len(),
            "💾 [STORE] State saved"
        );
        Ok(())
    }

    /// Restore history and totals from the state file.
    ///
    /// Signals that were still monitoring are discarded since their
    /// monitoring tasks did not survive the restart. Returns how many were
    /// discarded.
    pub fn load(&self) -> Result<usize> {
        let Some(state_file) = self.state_file.clone() else {
            return Ok(0);
        };

        if !state_file.exists() {
            info!(path = %state_file.display(), "💾 [STORE] No state file found, starting fresh");
            return Ok(0);
        }

        let json = fs::read_to_string(&state_file)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&json)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(TrackerError::Persistence(format!(
                "snapshot version {} is newer than supported {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }

        let resolved: Vec<TrackedSignal> = snapshot
            .history
            .into_iter()
            .filter(|s| !s.is_active())
            .collect();
        let totals = snapshot
            .totals
            .unwrap_or_else(|| OutcomeTotals::from_history(&resolved));

        let skip = resolved.len().saturating_sub(self.max_history);
        let history: VecDeque<TrackedSignal> = resolved.into_iter().skip(skip).collect();
        let discarded = snapshot.active.len();

        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.history = history;
            state.totals = totals;
        }

        if discarded > 0 {
            warn!(
                discarded,
                "💾 [STORE] Discarded signals that were still monitoring at last save"
            );
        }
        info!(
            path = %state_file.display(),
            history = self.history_len(),
            saved_at = %snapshot.saved_at,
            "💾 [STORE] State loaded"
        );
        Ok(discarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, ExitReason, SignalEntry, SignalStatus, Targets};

    fn temp_state_file(test_name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("sigtrack_store_{}_{}", test_name, uuid::Uuid::new_v4()))
            .join("state.json")
    }

    fn signal(id: &str) -> TrackedSignal {
        let entry = SignalEntry {
            id: id.to_string(),
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Long,
            entry_price: 100.0,
            confidence: 80.0,
            volatility: 0.02,
        };
        let targets = Targets {
            tp1: 100.8,
            tp2: 101.6,
            tp3: 102.8,
            stop_loss: 99.04,
        };
        TrackedSignal::new(&entry, targets, Utc::now())
    }

    fn resolved(id: &str, price: f64, reason: ExitReason) -> TrackedSignal {
        let mut s = signal(id);
        s.observe(price);
        s.settle(price, reason, Utc::now());
        s
    }

    #[test]
    fn record_rejects_unresolved_and_duplicates() {
        let store = OutcomeStore::new(10);
        assert!(!store.record(signal("open")));
        assert!(store.record(resolved("a", 101.0, ExitReason::Tp1)));
        assert!(!store.record(resolved("a", 99.0, ExitReason::StopLoss)));

        assert_eq!(store.history_len(), 1);
        assert_eq!(store.get("a").unwrap().status, SignalStatus::Win);
        assert_eq!(store.win_rate().total_signals, 1);
    }

    #[test]
    fn eviction_keeps_lifetime_totals() {
        let store = OutcomeStore::new(2);
        store.record(resolved("a", 101.0, ExitReason::Tp1));
        store.record(resolved("b", 99.0, ExitReason::StopLoss));
        store.record(resolved("c", 102.0, ExitReason::Tp2));

        assert_eq!(store.history_len(), 2);
        assert!(!store.contains("a"));
        let wr = store.win_rate();
        assert_eq!(wr.total_signals, 3);
        assert_eq!(wr.wins, 2);

        let ids: Vec<String> = store.completed(None).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(store.completed(Some(1)).len(), 1);
    }

    #[test]
    fn save_and_load_round_trip_discards_active() {
        let path = temp_state_file("round_trip");
        let store = OutcomeStore::new(10).with_state_file(path.clone());
        store.record(resolved("a", 101.0, ExitReason::Tp1));
        store.record(resolved("b", 99.0, ExitReason::StopLoss));
        store.save(&[signal("still-open")]).unwrap();

        let restored = OutcomeStore::new(10).with_state_file(path.clone());
        assert_eq!(restored.load().unwrap(), 1);
        assert_eq!(restored.history_len(), 2);
        assert_eq!(restored.totals(), store.totals());
        assert!(!restored.contains("still-open"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn load_rebuilds_missing_totals_and_truncates() {
        let path = temp_state_file("rebuild");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let snapshot = StoreSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            active: vec![],
            history: vec![
                resolved("a", 101.0, ExitReason::Tp1),
                resolved("b", 99.0, ExitReason::StopLoss),
                resolved("c", 102.0, ExitReason::Tp2),
            ],
            totals: None,
        };
        fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();

        let store = OutcomeStore::new(2).with_state_file(path.clone());
        assert_eq!(store.load().unwrap(), 0);
        assert_eq!(store.history_len(), 2);
        assert!(!store.contains("a"));
        assert_eq!(store.win_rate().total_signals, 3);

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_and_no_file_are_fresh_starts() {
        let store = OutcomeStore::new(10).with_state_file(temp_state_file("missing"));
        assert_eq!(store.load().unwrap(), 0);

        let in_memory = OutcomeStore::new(10);
        assert_eq!(in_memory.load().unwrap(), 0);
        assert!(in_memory.save(&[]).is_ok());
    }

    #[test]
    fn clear_resets_everything() {
        let store = OutcomeStore::new(10);
        store.record(resolved("a", 101.0, ExitReason::Tp1));
        store.clear();
        assert_eq!(store.history_len(), 0);
        assert_eq!(store.win_rate(), WinRate::default());
    }
}
