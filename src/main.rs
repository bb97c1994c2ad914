//! SigTrack - signal outcome tracker
//!
//! Reads signal entries as JSON lines on stdin, monitors each one against
//! the configured price feed and logs every resolution.
//!
//! ```text
//! {"id":"sig-1","symbol":"BTCUSDT","direction":"LONG","entry_price":43250.0,"confidence":72,"volatility":0.018}
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{broadcast::error::RecvError, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sigtrack::config::AppConfig;
use sigtrack::price_feed::{
    BinanceRestFeed, BinanceStreamFeed, PriceCache, PriceFeed, SimulatedFeed,
};
use sigtrack::store::{OutcomeCsvLog, OutcomeStore};
use sigtrack::tracker::SignalTracker;
use sigtrack::types::SignalEntry;

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn build_store(config: &AppConfig) -> Result<Arc<OutcomeStore>> {
    let mut store =
        OutcomeStore::new(config.persistence.max_history).with_state_file(config.state_path());
    if config.persistence.csv_enabled {
        store = store.with_csv_log(OutcomeCsvLog::new(&config.persistence.data_dir)?);
    }

    match store.load() {
        Ok(0) => {}
        Ok(discarded) => warn!(
            discarded,
            "Signals in flight at last shutdown were dropped; they are not replayed"
        ),
        Err(e) => warn!(error = %e, "💾 Failed to load state, starting fresh"),
    }
    Ok(Arc::new(store))
}

/// Feed plus, for the simulated provider, a handle to seed walks at entry price
fn build_feed(
    config: &AppConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<(Arc<dyn PriceFeed>, Option<Arc<SimulatedFeed>>)> {
    let feed_cfg = &config.price_feed;
    match feed_cfg.provider.as_str() {
        "binance_stream" => {
            let cache = Arc::new(PriceCache::new(feed_cfg.staleness_ms));
            let stream = BinanceStreamFeed::new(&feed_cfg.ws_url, &feed_cfg.symbols, cache.clone());
            tokio::spawn(async move {
                if let Err(e) = stream.run(shutdown).await {
                    error!(error = %e, "Binance stream stopped");
                }
            });
            let feed: Arc<dyn PriceFeed> = cache;
            Ok((feed, None))
        }
        "simulated" => {
            let simulated = Arc::new(SimulatedFeed::new(
                feed_cfg.simulated_start_price,
                feed_cfg.simulated_step_pct,
            ));
            let feed: Arc<dyn PriceFeed> = simulated.clone();
            Ok((feed, Some(simulated)))
        }
        _ => {
            let feed: Arc<dyn PriceFeed> = Arc::new(BinanceRestFeed::new(
                &feed_cfg.rest_url,
                Duration::from_millis(feed_cfg.request_timeout_ms),
            )?);
            Ok((feed, None))
        }
    }
}

fn handle_line(tracker: &Arc<SignalTracker>, simulated: Option<&SimulatedFeed>, line: &str) {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return;
    }

    let mut entry: SignalEntry = match serde_json::from_str(line) {
        Ok(entry) => entry,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed entry line");
            return;
        }
    };
    if entry.id.trim().is_empty() {
        entry.id = uuid::Uuid::new_v4().to_string();
    }
    if let Some(feed) = simulated {
        feed.set_price(&entry.symbol, entry.entry_price);
    }

    if let Err(e) = tracker.record_entry(entry, None) {
        warn!(error = %e, "Entry rejected");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_logging(config.logging.json);

    info!("🚀 SigTrack starting");
    info!("{}", config.digest());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let store = build_store(&config)?;
    let (feed, simulated) = build_feed(&config, shutdown_rx)?;
    let tracker = SignalTracker::new(config.tracker_config()?, feed, store)?;

    // Outcome log
    let mut outcomes = tracker.subscribe();
    tokio::spawn(async move {
        loop {
            match outcomes.recv().await {
                Ok(outcome) => info!(
                    signal_id = %outcome.signal_id,
                    symbol = %outcome.symbol,
                    direction = %outcome.direction,
                    "{} {} via {} at {} ({:+.2}%)",
                    if outcome.is_win() { "✅" } else { "❌" },
                    outcome.outcome,
                    outcome.exit_reason,
                    outcome.exit_price,
                    outcome.return_pct
                ),
                Err(RecvError::Lagged(missed)) => warn!(missed, "Outcome log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    #[cfg(feature = "dashboard")]
    {
        if config.dashboard.enabled {
            let tracker = tracker.clone();
            let port = config.dashboard.port;
            tokio::spawn(async move {
                if let Err(e) = sigtrack::dashboard::start_server(tracker, port).await {
                    error!(error = %e, "Dashboard server stopped");
                }
            });
        }
    }

    let mut persist_interval = tokio::time::interval(Duration::from_secs(
        config.tracker.persist_interval_secs.max(1),
    ));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!("📥 Reading signal entries from stdin (one JSON object per line)");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("🛑 Shutdown requested");
                break;
            }
            _ = persist_interval.tick() => {
                if let Err(e) = tracker.persist() {
                    warn!(error = %e, "💾 Periodic persist failed");
                }
                info!("{}", tracker.stats_report().summary_string());
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => handle_line(&tracker, simulated.as_deref(), &line),
                Ok(None) => {
                    info!("stdin closed, monitoring remaining signals");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    stdin_open = false;
                }
            },
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = tracker.shutdown() {
        error!(error = %e, "Final persist failed");
    }
    info!("{}", tracker.stats_report().summary_string());
    info!("Shutdown complete");
    Ok(())
}
