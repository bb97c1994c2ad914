//! Core types used throughout SigTrack
//!
//! Defines the tracked signal record, its lifecycle vocabulary and the
//! payloads exchanged with callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Long
    }
}

impl Direction {
    /// +1 for LONG, -1 for SHORT. Multiplies a favourable price move.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LONG" | "BUY" | "UP" => Some(Direction::Long),
            "SHORT" | "SELL" | "DOWN" => Some(Direction::Short),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Lifecycle status of a tracked signal.
///
/// `Monitoring` is the only non-terminal state; a signal never returns to it.
/// A timeout normally resolves as `Win` or `Loss` by the sign of the return
/// at the last observed price, with `ExitReason::Timeout` telling it apart
/// from a level crossing. `Expired` is kept for the one timeout that has no
/// price to classify: the feed never answered, so the exit is recorded at
/// the entry price. Aggregates count it as a loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStatus {
    Monitoring,
    Win,
    Loss,
    /// Horizon elapsed without a single usable price from the feed
    Expired,
}

impl SignalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SignalStatus::Monitoring)
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalStatus::Monitoring => write!(f, "MONITORING"),
            SignalStatus::Win => write!(f, "WIN"),
            SignalStatus::Loss => write!(f, "LOSS"),
            SignalStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Why a signal left `Monitoring`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    #[serde(rename = "TP1")]
    Tp1,
    #[serde(rename = "TP2")]
    Tp2,
    #[serde(rename = "TP3")]
    Tp3,
    StopLoss,
    Timeout,
}

impl ExitReason {
    pub fn is_take_profit(&self) -> bool {
        matches!(self, ExitReason::Tp1 | ExitReason::Tp2 | ExitReason::Tp3)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Tp1 => write!(f, "TP1"),
            ExitReason::Tp2 => write!(f, "TP2"),
            ExitReason::Tp3 => write!(f, "TP3"),
            ExitReason::StopLoss => write!(f, "STOP_LOSS"),
            ExitReason::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Take-profit and stop-loss levels, fixed at entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
    pub stop_loss: f64,
}

impl Targets {
    /// `stop < entry < tp1 < tp2 < tp3` for LONG, reversed for SHORT.
    pub fn is_ordered(&self, direction: Direction, entry_price: f64) -> bool {
        match direction {
            Direction::Long => {
                self.stop_loss < entry_price
                    && entry_price < self.tp1
                    && self.tp1 < self.tp2
                    && self.tp2 < self.tp3
            }
            Direction::Short => {
                self.stop_loss > entry_price
                    && entry_price > self.tp1
                    && self.tp1 > self.tp2
                    && self.tp2 > self.tp3
            }
        }
    }
}

/// A caller's request to start tracking a signal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEntry {
    #[serde(default)]
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    /// Confidence score in percent (0-100)
    pub confidence: f64,
    /// Volatility estimate as a fraction (0.02 = 2%)
    pub volatility: f64,
}

/// Terminal fields, written once when the signal resolves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalExit {
    pub price: f64,
    pub time: DateTime<Utc>,
    /// Realized return in percent, sign-adjusted for direction
    pub return_pct: f64,
    pub reason: ExitReason,
}

/// The unit of work: one signal from entry to resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedSignal {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub confidence: f64,
    pub volatility: f64,
    pub targets: Targets,
    pub last_price: f64,
    /// Highest price seen for LONG, lowest for SHORT
    pub extreme_price: f64,
    /// Number of ticks that produced a usable price
    #[serde(default)]
    pub ticks_observed: u32,
    pub status: SignalStatus,
    #[serde(default)]
    pub exit: Option<SignalExit>,
}

impl TrackedSignal {
    pub fn new(entry: &SignalEntry, targets: Targets, entry_time: DateTime<Utc>) -> Self {
        Self {
            id: entry.id.clone(),
            symbol: entry.symbol.clone(),
            direction: entry.direction,
            entry_price: entry.entry_price,
            entry_time,
            confidence: entry.confidence,
            volatility: entry.volatility,
            targets,
            last_price: entry.entry_price,
            extreme_price: entry.entry_price,
            ticks_observed: 0,
            status: SignalStatus::Monitoring,
            exit: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Realized return in percent if the signal exited at `price`
    pub fn return_pct_at(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        (price - self.entry_price) * self.direction.sign() / self.entry_price * 100.0
    }

    /// Record a price tick and report the level it crossed, if any.
    ///
    /// Stop-loss is checked before any target, and targets from the most
    /// aggressive (TP3) down to TP1.
    pub fn observe(&mut self, price: f64) -> Option<ExitReason> {
        if !self.is_active() {
            return None;
        }

        self.last_price = price;
        self.ticks_observed = self.ticks_observed.saturating_add(1);

        match self.direction {
            Direction::Long => {
                if price > self.extreme_price {
                    self.extreme_price = price;
                }
                if price <= self.targets.stop_loss {
                    Some(ExitReason::StopLoss)
                } else if price >= self.targets.tp3 {
                    Some(ExitReason::Tp3)
                } else if price >= self.targets.tp2 {
                    Some(ExitReason::Tp2)
                } else if price >= self.targets.tp1 {
                    Some(ExitReason::Tp1)
                } else {
                    None
                }
            }
            Direction::Short => {
                if price < self.extreme_price {
                    self.extreme_price = price;
                }
                if price >= self.targets.stop_loss {
                    Some(ExitReason::StopLoss)
                } else if price <= self.targets.tp3 {
                    Some(ExitReason::Tp3)
                } else if price <= self.targets.tp2 {
                    Some(ExitReason::Tp2)
                } else if price <= self.targets.tp1 {
                    Some(ExitReason::Tp1)
                } else {
                    None
                }
            }
        }
    }

    /// Move the signal to its terminal state. Returns `false` without touching
    /// anything if it already left `Monitoring`.
    pub fn settle(&mut self, exit_price: f64, reason: ExitReason, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }

        let return_pct = self.return_pct_at(exit_price);
        self.status = match reason {
            ExitReason::Tp1 | ExitReason::Tp2 | ExitReason::Tp3 => SignalStatus::Win,
            ExitReason::StopLoss => SignalStatus::Loss,
            ExitReason::Timeout if self.ticks_observed == 0 => SignalStatus::Expired,
            ExitReason::Timeout if return_pct > 0.0 => SignalStatus::Win,
            ExitReason::Timeout => SignalStatus::Loss,
        };
        self.last_price = exit_price;
        self.exit = Some(SignalExit {
            price: exit_price,
            time: now,
            return_pct,
            reason,
        });
        true
    }

    /// Time between entry and exit, or entry and `now` while monitoring
    pub fn hold_duration_ms(&self, now: DateTime<Utc>) -> i64 {
        let end = self.exit.as_ref().map(|e| e.time).unwrap_or(now);
        (end - self.entry_time).num_milliseconds().max(0)
    }

    pub fn return_pct(&self) -> Option<f64> {
        self.exit.as_ref().map(|e| e.return_pct)
    }

    pub fn exit_reason(&self) -> Option<ExitReason> {
        self.exit.as_ref().map(|e| e.reason)
    }
}

/// Resolution payload handed to the completion callback and subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalOutcome {
    pub signal_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub outcome: SignalStatus,
    pub return_pct: f64,
    pub exit_reason: ExitReason,
    pub exit_price: f64,
    pub hold_duration_ms: i64,
}

impl SignalOutcome {
    /// Build from a resolved signal; `None` while it is still monitoring.
    pub fn from_signal(signal: &TrackedSignal) -> Option<Self> {
        let exit = signal.exit.as_ref()?;
        Some(Self {
            signal_id: signal.id.clone(),
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            outcome: signal.status,
            return_pct: exit.return_pct,
            exit_reason: exit.reason,
            exit_price: exit.price,
            hold_duration_ms: signal.hold_duration_ms(exit.time),
        })
    }

    pub fn is_win(&self) -> bool {
        self.outcome == SignalStatus::Win
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_signal() -> TrackedSignal {
        let entry = SignalEntry {
            id: "sig-1".to_string(),
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

    #[test]
    fn direction_parses_common_aliases() {
        assert_eq!(Direction::from_str("long"), Some(Direction::Long));
        assert_eq!(Direction::from_str(" SELL "), Some(Direction::Short));
        assert_eq!(Direction::from_str("sideways"), None);
    }

    #[test]
    fn exit_reason_serializes_to_wire_names() {
        assert_eq!(serde_json::to_string(&ExitReason::Tp2).unwrap(), "\"TP2\"");
        assert_eq!(
            serde_json::to_string(&ExitReason::StopLoss).unwrap(),
            "\"STOP_LOSS\""
        );
        assert_eq!(
            serde_json::to_string(&SignalStatus::Monitoring).unwrap(),
            "\"MONITORING\""
        );
    }

    #[test]
    fn observe_tracks_running_high_for_long() {
        let mut signal = long_signal();
        assert_eq!(signal.observe(100.5), None);
        assert_eq!(signal.observe(100.2), None);
        assert_eq!(signal.extreme_price, 100.5);
        assert_eq!(signal.last_price, 100.2);
        assert_eq!(signal.ticks_observed, 2);
    }

    #[test]
    fn stop_wins_when_a_tick_satisfies_both() {
        let mut signal = long_signal();
        // Degenerate levels where one price is past the stop and every target
        signal.targets.stop_loss = 103.0;
        assert_eq!(signal.observe(102.9), Some(ExitReason::StopLoss));

        let mut short = long_signal();
        short.direction = Direction::Short;
        short.targets = Targets {
            tp1: 99.0,
            tp2: 98.0,
            tp3: 97.0,
            stop_loss: 96.0,
        };
        assert_eq!(short.observe(96.5), Some(ExitReason::StopLoss));
    }

    #[test]
    fn highest_target_reported_on_a_jump() {
        let mut signal = long_signal();
        assert_eq!(signal.observe(101.7), Some(ExitReason::Tp2));
        let mut signal = long_signal();
        assert_eq!(signal.observe(150.0), Some(ExitReason::Tp3));
    }

    #[test]
    fn settle_is_one_way() {
        let mut signal = long_signal();
        assert!(signal.settle(101.0, ExitReason::Tp1, Utc::now()));
        let first = signal.clone();

        assert!(!signal.settle(98.0, ExitReason::StopLoss, Utc::now()));
        assert_eq!(signal, first);
        assert_eq!(signal.status, SignalStatus::Win);
        assert_eq!(signal.observe(50.0), None);
    }

    #[test]
    fn timeout_without_any_tick_expires() {
        let mut signal = long_signal();
        assert!(signal.settle(100.0, ExitReason::Timeout, Utc::now()));
        assert_eq!(signal.status, SignalStatus::Expired);
        assert_eq!(signal.return_pct(), Some(0.0));
    }

    #[test]
    fn timeout_after_ticks_uses_win_loss() {
        let mut up = long_signal();
        up.observe(100.5);
        assert!(up.settle(100.5, ExitReason::Timeout, Utc::now()));
        assert_eq!(up.status, SignalStatus::Win);

        let mut flat = long_signal();
        flat.observe(100.0);
        assert!(flat.settle(100.0, ExitReason::Timeout, Utc::now()));
        assert_eq!(flat.status, SignalStatus::Loss);
    }

    #[test]
    fn short_return_is_sign_adjusted() {
        let mut signal = long_signal();
        signal.direction = Direction::Short;
        assert!((signal.return_pct_at(98.0) - 2.0).abs() < 1e-9);
        assert!((signal.return_pct_at(101.0) + 1.0).abs() < 1e-9);
    }
}
