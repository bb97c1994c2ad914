//! Statistics Reporter
//!
//! Win-rate aggregates over resolved signals. `OutcomeTotals` is maintained
//! incrementally by the store so lifetime numbers survive history eviction;
//! `StatsReport` is a single pass over the retained history.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{ExitReason, SignalStatus, TrackedSignal};

/// Headline aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WinRate {
    /// Percent of resolved signals that were wins
    pub win_rate: f64,
    pub total_signals: u32,
    pub wins: u32,
    pub losses: u32,
}

impl WinRate {
    pub fn from_counts(wins: u32, losses: u32) -> Self {
        let total = wins + losses;
        let win_rate = if total > 0 {
            wins as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            win_rate,
            total_signals: total,
            wins,
            losses,
        }
    }

    /// Single pass over resolved signals. Timeouts count by their realized
    /// sign, expired signals as losses.
    pub fn from_signals<'a>(signals: impl IntoIterator<Item = &'a TrackedSignal>) -> Self {
        let (mut wins, mut losses) = (0u32, 0u32);
        for signal in signals {
            match signal.status {
                SignalStatus::Win => wins += 1,
                SignalStatus::Loss | SignalStatus::Expired => losses += 1,
                SignalStatus::Monitoring => {}
            }
        }
        Self::from_counts(wins, losses)
    }
}

/// Lifetime counters, updated once per resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeTotals {
    pub wins: u32,
    pub losses: u32,
    pub take_profit_exits: u32,
    pub stop_loss_exits: u32,
    pub timeout_exits: u32,
    pub sum_return_pct: f64,
    pub best_return_pct: f64,
    pub worst_return_pct: f64,
    /// Positive = consecutive wins, negative = consecutive losses
    pub current_streak: i32,
    pub best_streak: i32,
    pub worst_streak: i32,
}

impl OutcomeTotals {
    /// Fold one resolved signal in. Monitoring signals are ignored.
    pub fn record(&mut self, signal: &TrackedSignal) {
        let Some(exit) = signal.exit.as_ref() else {
            return;
        };
        let is_win = match signal.status {
            SignalStatus::Win => true,
            SignalStatus::Loss | SignalStatus::Expired => false,
            SignalStatus::Monitoring => return,
        };

        let first = self.wins + self.losses == 0;
        if is_win {
            self.wins += 1;
            self.current_streak = self.current_streak.max(0) + 1;
        } else {
            self.losses += 1;
            self.current_streak = self.current_streak.min(0) - 1;
        }
        self.best_streak = self.best_streak.max(self.current_streak);
        self.worst_streak = self.worst_streak.min(self.current_streak);

        match exit.reason {
            ExitReason::Tp1 | ExitReason::Tp2 | ExitReason::Tp3 => self.take_profit_exits += 1,
            ExitReason::StopLoss => self.stop_loss_exits += 1,
            ExitReason::Timeout => self.timeout_exits += 1,
        }

        self.sum_return_pct += exit.return_pct;
        if first {
            self.best_return_pct = exit.return_pct;
            self.worst_return_pct = exit.return_pct;
        } else {
            self.best_return_pct = self.best_return_pct.max(exit.return_pct);
            self.worst_return_pct = self.worst_return_pct.min(exit.return_pct);
        }
    }

    /// Rebuild from history, oldest first (used when a snapshot has no totals)
    pub fn from_history<'a>(signals: impl IntoIterator<Item = &'a TrackedSignal>) -> Self {
        let mut totals = Self::default();
        for signal in signals {
            totals.record(signal);
        }
        totals
    }

    pub fn total(&self) -> u32 {
        self.wins + self.losses
    }

    pub fn win_rate(&self) -> WinRate {
        WinRate::from_counts(self.wins, self.losses)
    }

    pub fn avg_return_pct(&self) -> f64 {
        if self.total() > 0 {
            self.sum_return_pct / self.total() as f64
        } else {
            0.0
        }
    }
}

/// Detailed breakdown for logs and the dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsReport {
    /// Lifetime counters (not affected by eviction)
    pub lifetime: WinRate,
    pub lifetime_avg_return_pct: f64,
    pub current_streak: i32,
    pub best_streak: i32,
    pub worst_streak: i32,
    /// Over the retained history only
    pub recent: WinRate,
    pub recent_avg_return_pct: f64,
    pub avg_hold_secs: f64,
    pub best_return_pct: f64,
    pub worst_return_pct: f64,
    pub by_symbol: BTreeMap<String, WinRate>,
    pub by_exit_reason: BTreeMap<String, u32>,
    pub active_signals: usize,
}

impl StatsReport {
    pub fn build(totals: &OutcomeTotals, history: &[TrackedSignal], active_signals: usize) -> Self {
        let now = Utc::now();
        let mut by_symbol_counts: BTreeMap<String, (u32, u32)> = BTreeMap::new();
        let mut by_exit_reason: BTreeMap<String, u32> = BTreeMap::new();
        let mut sum_return = 0.0;
        let mut sum_hold_ms = 0i64;
        let mut best = f64::NEG_INFINITY;
        let mut worst = f64::INFINITY;
        let mut resolved = 0u32;

        for signal in history {
            let Some(exit) = signal.exit.as_ref() else {
                continue;
            };
            resolved += 1;
            let counts = by_symbol_counts.entry(signal.symbol.clone()).or_default();
            if signal.status == SignalStatus::Win {
                counts.0 += 1;
            } else {
                counts.1 += 1;
            }
            *by_exit_reason.entry(exit.reason.to_string()).or_default() += 1;
            sum_return += exit.return_pct;
            sum_hold_ms += signal.hold_duration_ms(now);
            best = best.max(exit.return_pct);
            worst = worst.min(exit.return_pct);
        }

        let (recent_avg, avg_hold_secs) = if resolved > 0 {
            (
                sum_return / resolved as f64,
                sum_hold_ms as f64 / resolved as f64 / 1000.0,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            lifetime: totals.win_rate(),
            lifetime_avg_return_pct: totals.avg_return_pct(),
            current_streak: totals.current_streak,
            best_streak: totals.best_streak,
            worst_streak: totals.worst_streak,
            recent: WinRate::from_signals(history),
            recent_avg_return_pct: recent_avg,
            avg_hold_secs,
            best_return_pct: if resolved > 0 { best } else { 0.0 },
            worst_return_pct: if resolved > 0 { worst } else { 0.0 },
            by_symbol: by_symbol_counts
                .into_iter()
                .map(|(sym, (w, l))| (sym, WinRate::from_counts(w, l)))
                .collect(),
            by_exit_reason,
            active_signals,
        }
    }

    pub fn summary_string(&self) -> String {
        format!(
            "📋 Signals: {}/{} won ({:.0}% WR) | avg {:+.2}% | streak {:+} | recent {:.0}% of {} | {} active",
            self.lifetime.wins,
            self.lifetime.total_signals,
            self.lifetime.win_rate,
            self.lifetime_avg_return_pct,
            self.current_streak,
            self.recent.win_rate,
            self.recent.total_signals,
            self.active_signals
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, SignalEntry, Targets};

    fn resolved(symbol: &str, exit_price: f64, reason: ExitReason) -> TrackedSignal {
        let entry = SignalEntry {
            id: format!("{}-{}", symbol, exit_price),
            symbol: symbol.to_string(),
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
        let mut signal = TrackedSignal::new(&entry, targets, Utc::now());
        signal.observe(exit_price);
        signal.settle(exit_price, reason, Utc::now());
        signal
    }

    #[test]
    fn win_rate_from_counts() {
        let wr = WinRate::from_counts(3, 1);
        assert_eq!(wr.total_signals, 4);
        assert!((wr.win_rate - 75.0).abs() < 1e-9);
        assert_eq!(WinRate::from_counts(0, 0).win_rate, 0.0);
    }

    #[test]
    fn timeouts_count_by_sign() {
        let history = vec![
            resolved("BTCUSDT", 100.3, ExitReason::Timeout),
            resolved("BTCUSDT", 99.9, ExitReason::Timeout),
            resolved("ETHUSDT", 101.0, ExitReason::Tp1),
        ];
        let wr = WinRate::from_signals(&history);
        assert_eq!(wr.wins, 2);
        assert_eq!(wr.losses, 1);
    }

    #[test]
    fn totals_track_streaks_and_extremes() {
        let mut totals = OutcomeTotals::default();
        totals.record(&resolved("BTCUSDT", 101.0, ExitReason::Tp1));
        totals.record(&resolved("BTCUSDT", 102.9, ExitReason::Tp3));
        totals.record(&resolved("BTCUSDT", 99.0, ExitReason::StopLoss));

        assert_eq!(totals.wins, 2);
        assert_eq!(totals.losses, 1);
        assert_eq!(totals.best_streak, 2);
        assert_eq!(totals.current_streak, -1);
        assert_eq!(totals.take_profit_exits, 2);
        assert_eq!(totals.stop_loss_exits, 1);
        assert!((totals.best_return_pct - 2.9).abs() < 1e-9);
        assert!((totals.worst_return_pct + 1.0).abs() < 1e-9);
    }

    #[test]
    fn report_breaks_down_by_symbol_and_reason() {
        let history = vec![
            resolved("BTCUSDT", 101.0, ExitReason::Tp1),
            resolved("ETHUSDT", 99.0, ExitReason::StopLoss),
            resolved("ETHUSDT", 102.0, ExitReason::Tp2),
        ];
        let totals = OutcomeTotals::from_history(&history);
        let report = StatsReport::build(&totals, &history, 2);

        assert_eq!(report.lifetime.total_signals, 3);
        assert_eq!(report.by_symbol["ETHUSDT"].wins, 1);
        assert_eq!(report.by_symbol["ETHUSDT"].losses, 1);
        assert_eq!(report.by_exit_reason["STOP_LOSS"], 1);
        assert_eq!(report.active_signals, 2);
        assert!(report.summary_string().contains("2/3"));
    }
}
