//! SigTrack Library
//!
//! Tracks trading signals from entry to a WIN/LOSS resolution against live
//! prices, and aggregates the outcomes into win-rate statistics.

pub mod config;
pub mod error;
pub mod price_feed;
pub mod stats;
pub mod store;
pub mod targets;
pub mod tracker;
pub mod types;

#[cfg(feature = "dashboard")]
pub mod dashboard;

pub use error::{Result, TrackerError};
pub use stats::{StatsReport, WinRate};
pub use store::OutcomeStore;
pub use targets::{compute_targets, TargetCalculator, TargetConfig};
pub use tracker::{OutcomeCallback, SignalTracker, TrackerConfig};
pub use types::{
    Direction, ExitReason, SignalEntry, SignalOutcome, SignalStatus, Targets, TrackedSignal,
};
