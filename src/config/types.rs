//! Configuration section types

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerCfg {
    /// Price poll interval per signal in milliseconds
    pub poll_interval_ms: u64,
    /// Monitoring horizon in seconds; every signal resolves within it
    pub monitoring_duration_secs: u64,
    /// Upper bound on a single price lookup in milliseconds
    pub price_timeout_ms: u64,
    /// Periodic persistence + stats log interval in seconds
    pub persist_interval_secs: u64,
    /// Buffered outcomes per subscriber
    pub outcome_channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetsCfg {
    pub base_profit_pct: f64,
    pub tp_multipliers: Vec<f64>,
    pub base_stop_pct: f64,
    pub reference_volatility: f64,
    pub volatility_clamp_min: f64,
    pub volatility_clamp_max: f64,
    pub min_confidence_multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory
    pub data_dir: String,
    /// State snapshot file name inside `data_dir`
    pub state_file: String,
    /// Resolved signals kept in history
    pub max_history: usize,
    /// Append every outcome to a daily CSV
    pub csv_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceFeedConfig {
    /// binance_rest | binance_stream | simulated
    pub provider: String,
    pub rest_url: String,
    pub ws_url: String,
    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Cached stream prices older than this are treated as unavailable
    pub staleness_ms: u64,
    /// Symbols subscribed by the stream provider
    pub symbols: Vec<String>,
    pub simulated_start_price: f64,
    pub simulated_step_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}
