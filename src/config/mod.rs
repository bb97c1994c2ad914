//! Configuration management for SigTrack
//!
//! Loads from config files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::targets::TargetConfig;
use crate::tracker::TrackerConfig;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub tracker: TrackerCfg,
    pub targets: TargetsCfg,
    pub persistence: PersistenceConfig,
    pub price_feed: PriceFeedConfig,
    pub logging: LoggingConfig,
    pub dashboard: DashboardConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Tracker defaults
            .set_default("tracker.poll_interval_ms", 1000)?
            .set_default("tracker.monitoring_duration_secs", 120)?
            .set_default("tracker.price_timeout_ms", 2000)?
            .set_default("tracker.persist_interval_secs", 30)?
            .set_default("tracker.outcome_channel_capacity", 256)?
            // Target defaults
            .set_default("targets.base_profit_pct", 0.01)?
            .set_default("targets.tp_multipliers", vec![1.0, 2.0, 3.5])?
            .set_default("targets.base_stop_pct", 0.008)?
            .set_default("targets.reference_volatility", 0.02)?
            .set_default("targets.volatility_clamp_min", 0.5)?
            .set_default("targets.volatility_clamp_max", 2.0)?
            .set_default("targets.min_confidence_multiplier", 0.1)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.state_file", "tracker_state.json")?
            .set_default("persistence.max_history", 100)?
            .set_default("persistence.csv_enabled", true)?
            // Price feed defaults
            .set_default("price_feed.provider", "binance_rest")?
            .set_default("price_feed.rest_url", "https://api.binance.com")?
            .set_default("price_feed.ws_url", "wss://stream.binance.com:9443/stream")?
            .set_default("price_feed.request_timeout_ms", 2000)?
            .set_default("price_feed.staleness_ms", 10000)?
            .set_default("price_feed.symbols", vec!["BTCUSDT", "ETHUSDT"])?
            .set_default("price_feed.simulated_start_price", 100.0)?
            .set_default("price_feed.simulated_step_pct", 0.001)?
            // Logging defaults
            .set_default("logging.json", false)?
            // Dashboard defaults
            .set_default("dashboard.enabled", false)?
            .set_default("dashboard.port", 3030)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SIGTRACK__*)
            .add_source(Environment::with_prefix("SIGTRACK").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tracker.poll_interval_ms == 0 {
            bail!("tracker.poll_interval_ms must be greater than zero");
        }
        if self.tracker.monitoring_duration_secs == 0 {
            bail!("tracker.monitoring_duration_secs must be greater than zero");
        }
        if self.tracker.outcome_channel_capacity == 0 {
            bail!("tracker.outcome_channel_capacity must be greater than zero");
        }
        if self.persistence.max_history == 0 {
            bail!("persistence.max_history must be greater than zero");
        }
        match self.price_feed.provider.as_str() {
            "binance_rest" | "binance_stream" | "simulated" => {}
            other => bail!("Unknown price_feed.provider: {}", other),
        }
        self.target_config()?
            .validate()
            .context("Invalid targets configuration")?;
        Ok(())
    }

    /// Engine-facing target parameters
    pub fn target_config(&self) -> Result<TargetConfig> {
        let tp_multipliers: [f64; 3] = match self.targets.tp_multipliers.as_slice() {
            [a, b, c] => [*a, *b, *c],
            other => bail!(
                "targets.tp_multipliers needs exactly 3 values, got {}",
                other.len()
            ),
        };
        Ok(TargetConfig {
            base_profit_pct: self.targets.base_profit_pct,
            tp_multipliers,
            base_stop_pct: self.targets.base_stop_pct,
            reference_volatility: self.targets.reference_volatility,
            volatility_clamp_min: self.targets.volatility_clamp_min,
            volatility_clamp_max: self.targets.volatility_clamp_max,
            min_confidence_multiplier: self.targets.min_confidence_multiplier,
        })
    }

    /// Engine-facing tracker parameters
    pub fn tracker_config(&self) -> Result<TrackerConfig> {
        Ok(TrackerConfig {
            poll_interval: Duration::from_millis(self.tracker.poll_interval_ms),
            monitoring_duration: Duration::from_secs(self.tracker.monitoring_duration_secs),
            price_timeout: Duration::from_millis(self.tracker.price_timeout_ms),
            outcome_channel_capacity: self.tracker.outcome_channel_capacity,
            targets: self.target_config()?,
        })
    }

    /// Full path of the JSON state snapshot
    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(&self.persistence.data_dir).join(&self.persistence.state_file)
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "feed={} poll={}ms horizon={}s history={} data_dir={}",
            self.price_feed.provider,
            self.tracker.poll_interval_ms,
            self.tracker.monitoring_duration_secs,
            self.persistence.max_history,
            self.persistence.data_dir
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
