//! Dashboard Module
//!
//! HTTP/WebSocket API over a running tracker.
//! Only compiled when the `dashboard` feature is enabled.

mod api;
mod types;

pub use api::create_router;
pub use types::*;

use chrono::Utc;
use std::sync::Arc;

use crate::tracker::SignalTracker;

/// Shared handler state
pub struct DashboardContext {
    pub tracker: Arc<SignalTracker>,
    started_at: i64,
}

impl DashboardContext {
    pub fn new(tracker: Arc<SignalTracker>) -> Self {
        Self {
            tracker,
            started_at: Utc::now().timestamp(),
        }
    }

    pub fn health(&self) -> HealthResponse {
        let now = Utc::now();
        HealthResponse {
            status: if self.tracker.is_shutting_down() {
                "stopping".to_string()
            } else {
                "ok".to_string()
            },
            feed: self.tracker.feed().name().to_string(),
            active_signals: self.tracker.active_count(),
            resolved_signals: self.tracker.win_rate().total_signals,
            shutting_down: self.tracker.is_shutting_down(),
            uptime_secs: (now.timestamp() - self.started_at).max(0),
            updated_at: now.timestamp_millis(),
        }
    }
}

/// Start the dashboard server
pub async fn start_server(tracker: Arc<SignalTracker>, port: u16) -> anyhow::Result<()> {
    let app = create_router(Arc::new(DashboardContext::new(tracker)));
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("🖥️ Dashboard API starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_feed::ScriptedFeed;
    use crate::store::OutcomeStore;
    use crate::tracker::TrackerConfig;
    use crate::types::TrackedSignal;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router() -> (Arc<SignalTracker>, axum::Router) {
        let feed = ScriptedFeed::new().with_prices("BTCUSDT", &[100.0]);
        let tracker = SignalTracker::new(
            TrackerConfig::default(),
            Arc::new(feed),
            Arc::new(OutcomeStore::new(10)),
        )
        .unwrap();
        let app = create_router(Arc::new(DashboardContext::new(tracker.clone())));
        (tracker, app)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/signals")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const ENTRY: &str = r#"{"id":"sig-1","symbol":"BTCUSDT","direction":"LONG","entry_price":100.0,"confidence":80.0,"volatility":0.02}"#;

    #[tokio::test]
    async fn post_then_read_back() {
        let (tracker, app) = router();

        let created = app.clone().oneshot(post(ENTRY)).await.unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let json = body_json(created).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "MONITORING");

        let fetched = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/signals/sig-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        let json = body_json(fetched).await;
        let signal: TrackedSignal = serde_json::from_value(json["data"].clone()).unwrap();
        assert_eq!(signal.targets.stop_loss, tracker.get_status("sig-1").unwrap().targets.stop_loss);

        let active = app
            .oneshot(
                Request::builder()
                    .uri("/api/signals/active")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(active).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);

        tracker.reset();
    }

    #[tokio::test]
    async fn duplicate_and_invalid_entries_are_rejected() {
        let (tracker, app) = router();
        app.clone().oneshot(post(ENTRY)).await.unwrap();

        let dup = app.clone().oneshot(post(ENTRY)).await.unwrap();
        assert_eq!(dup.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(dup).await["success"], false);

        let bad = app
            .oneshot(post(
                r#"{"symbol":"BTCUSDT","direction":"SHORT","entry_price":-1.0,"confidence":50.0,"volatility":0.02}"#,
            ))
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        tracker.reset();
    }

    #[tokio::test]
    async fn unknown_signal_is_not_found() {
        let (_tracker, app) = router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/signals/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_and_stats() {
        let (_tracker, app) = router();
        let health = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(health).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["feed"], "scripted");

        let stats = app
            .oneshot(
                Request::builder()
                    .uri("/api/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(stats).await;
        assert_eq!(json["data"]["lifetime"]["total_signals"], 0);
    }
}
