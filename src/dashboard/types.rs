//! Dashboard Types
//!
//! JSON shapes served by the dashboard API.

use serde::{Deserialize, Serialize};

use crate::stats::StatsReport;
use crate::types::{SignalOutcome, TrackedSignal};

// ─────────────────────────────────────────────────────────────────
// Response Types
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HealthResponse {
    pub status: String,
    pub feed: String,
    pub active_signals: usize,
    pub resolved_signals: u32,
    pub shutting_down: bool,
    pub uptime_secs: i64,
    pub updated_at: i64,
}

/// Active signals plus the report, sent when a WebSocket client connects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub active: Vec<TrackedSignal>,
    pub stats: StatsReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaggedPayload {
    pub missed: u64,
}

// ─────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletedQuery {
    pub limit: Option<usize>,
}

// ─────────────────────────────────────────────────────────────────
// WebSocket Message Types
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Sent on connect
    Snapshot(SnapshotPayload),
    /// A signal resolved
    Outcome(SignalOutcome),
    /// The client fell behind and missed outcomes
    Lagged(LaggedPayload),
}

// ─────────────────────────────────────────────────────────────────
// API Response Wrapper
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
