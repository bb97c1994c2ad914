//! Binance spot price adapters
//!
//! REST ticker lookups, and a miniTicker WebSocket stream that keeps a
//! `PriceCache` warm.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::{normalize_symbol, PriceCache, PriceFeed};

const TICKER_PATH: &str = "/api/v3/ticker/price";

/// One REST request per lookup against `/api/v3/ticker/price`
#[derive(Debug, Clone)]
pub struct BinanceRestFeed {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceRestFeed {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Parse `{"symbol":"BTCUSDT","price":"43250.10000000"}`
    fn parse_ticker(body: &serde_json::Value) -> Result<f64> {
        let price: f64 = body["price"]
            .as_str()
            .context("Missing price in ticker response")?
            .parse()
            .context("Unparseable ticker price")?;
        Ok(price)
    }
}

#[async_trait]
impl PriceFeed for BinanceRestFeed {
    fn name(&self) -> &'static str {
        "binance_rest"
    }

    async fn get_price(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}{}", self.base_url, TICKER_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", normalize_symbol(symbol))])
            .send()
            .await
            .context("Failed to fetch ticker from Binance")?;

        if !response.status().is_success() {
            bail!("Binance API returned error: {}", response.status());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Binance ticker response")?;

        let price = Self::parse_ticker(&body)?;
        Ok((price.is_finite() && price > 0.0).then_some(price))
    }
}

/// Streams `<symbol>@miniTicker` updates into a shared cache
#[derive(Debug, Clone)]
pub struct BinanceStreamFeed {
    ws_url: String,
    symbols: Vec<String>,
    cache: Arc<PriceCache>,
    max_reconnect_attempts: u32,
}

impl BinanceStreamFeed {
    pub fn new(ws_url: &str, symbols: &[String], cache: Arc<PriceCache>) -> Self {
        Self {
            ws_url: ws_url.to_string(),
            symbols: symbols.iter().map(|s| normalize_symbol(s)).collect(),
            cache,
            max_reconnect_attempts: 10,
        }
    }

    /// Cache the tracker reads from
    pub fn cache(&self) -> Arc<PriceCache> {
        self.cache.clone()
    }

    fn build_stream_url(&self) -> String {
        let streams: Vec<String> = self
            .symbols
            .iter()
            .map(|s| format!("{}@miniTicker", s.to_lowercase()))
            .collect();
        format!("{}?streams={}", self.ws_url, streams.join("/"))
    }

    /// Combined stream messages have format:
    /// `{"stream":"btcusdt@miniTicker","data":{"E":1700000000000,"s":"BTCUSDT","c":"43250.1",...}}`
    fn handle_message(&self, text: &str) -> Result<()> {
        let wrapper: serde_json::Value = serde_json::from_str(text)?;
        let data = &wrapper["data"];

        let symbol = data["s"].as_str().context("Missing symbol")?;
        let price: f64 = data["c"]
            .as_str()
            .context("Missing close price")?
            .parse()
            .context("Unparseable close price")?;

        match data["E"].as_i64() {
            Some(ts) => self.cache.update_at(symbol, price, ts),
            None => self.cache.update(symbol, price),
        }
        Ok(())
    }

    /// Connect and keep the cache updated until `shutdown` flips to true.
    /// Reconnects with linear backoff.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if self.symbols.is_empty() {
            bail!("No symbols configured for the Binance stream");
        }

        let url = self.build_stream_url();
        let mut reconnect_attempts = 0u32;
        let base_delay = Duration::from_secs(1);
        let max_delay = Duration::from_secs(60);

        'reconnect_loop: loop {
            tracing::info!(
                source = %"Binance",
                symbols = self.symbols.len(),
                attempt = reconnect_attempts,
                "Connecting to Binance WebSocket..."
            );

            let should_reconnect = match connect_async(&url).await {
                Ok((ws_stream, _)) => {
                    reconnect_attempts = 0;
                    tracing::info!(source = %"Binance", "✅ Connected to Binance WebSocket");
                    let (mut write, mut read) = ws_stream.split();

                    loop {
                        tokio::select! {
                            _ = shutdown.changed() => {
                                let _ = write.send(Message::Close(None)).await;
                                break 'reconnect_loop;
                            }
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    if let Err(e) = self.handle_message(&text) {
                                        tracing::debug!(source = %"Binance", error = %e, "Failed to parse message");
                                    }
                                }
                                Some(Ok(Message::Ping(data))) => {
                                    let _ = write.send(Message::Pong(data)).await;
                                }
                                Some(Ok(Message::Close(_))) => {
                                    tracing::warn!(source = %"Binance", "Connection closed by server");
                                    break true;
                                }
                                Some(Err(e)) => {
                                    tracing::error!(source = %"Binance", error = %e, "WebSocket error");
                                    break true;
                                }
                                None => {
                                    tracing::warn!(source = %"Binance", "Stream ended");
                                    break true;
                                }
                                _ => {}
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(source = %"Binance", error = %e, "Connection failed");
                    true
                }
            };

            if !should_reconnect || *shutdown.borrow() {
                break;
            }

            reconnect_attempts += 1;
            if reconnect_attempts > self.max_reconnect_attempts {
                bail!(
                    "Max reconnection attempts ({}) reached",
                    self.max_reconnect_attempts
                );
            }
            let delay = std::cmp::min(base_delay * reconnect_attempts, max_delay);
            tracing::info!(
                source = %"Binance",
                delay_secs = delay.as_secs(),
                attempt = reconnect_attempts,
                "🔄 Reconnecting in {} seconds...", delay.as_secs()
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!(source = %"Binance", "Stream stopped");
        Ok(())
    }
}
