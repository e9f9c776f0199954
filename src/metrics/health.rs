//! HTTP health endpoints and the Prometheus scrape endpoint
//!
//! `/health` reports the full component check, `/ready` and `/alive` are the
//! readiness and liveness checks, `/stats` is the lobby snapshot and `/metrics` the
//! scrape target.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Clone)]
struct HealthServerState {
    metrics_collector: Arc<MetricsCollector>,
    app_state: Option<Arc<AppState>>,
}

/// Serves the health and metrics endpoints until stopped
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                app_state: None,
            },
            shutdown_tx,
        }
    }

    /// Attach the application whose health the endpoints report
    pub fn with_app_state(mut self, app_state: Arc<AppState>) -> Self {
        self.state.app_state = Some(app_state);
        self
    }

    /// Serve until [`HealthServer::stop`] is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind health server to {}", addr))?;
        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, self.create_router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .with_state(self.state.clone())
    }

    pub async fn stop(&self) -> Result<()> {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }
        Ok(())
    }
}

fn status_code(status: &HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    }
}

fn not_initialized() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": HealthStatus::Unhealthy,
            "error": "Service not initialized"
        })),
    )
        .into_response()
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "pvp-lobby",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/ready", "/alive", "/metrics", "/stats"]
    }))
}

/// Full check: service state plus the matchmaker's fill section
async fn health_handler(State(state): State<HealthServerState>) -> Response {
    let Some(app_state) = state.app_state else {
        return not_initialized();
    };

    match HealthCheck::check(app_state).await {
        Ok(health) => (status_code(&health.status), Json(health)).into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            not_initialized()
        }
    }
}

async fn ready_handler(State(state): State<HealthServerState>) -> Response {
    let Some(app_state) = state.app_state else {
        return not_initialized();
    };

    let status = HealthCheck::readiness_check(app_state)
        .await
        .unwrap_or(HealthStatus::Unhealthy);
    debug!("Readiness check: {:?}", status);
    (status_code(&status), Json(json!({ "status": status }))).into_response()
}

async fn alive_handler(State(state): State<HealthServerState>) -> Response {
    let Some(app_state) = state.app_state else {
        return not_initialized();
    };

    let status = HealthCheck::liveness_check(app_state)
        .await
        .unwrap_or(HealthStatus::Unhealthy);
    (status_code(&status), Json(json!({ "status": status }))).into_response()
}

async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    match state.metrics_collector.render_text() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Lobby snapshot: connected clients and matchmaker counters
async fn stats_handler(State(state): State<HealthServerState>) -> Response {
    let Some(app_state) = state.app_state else {
        return not_initialized();
    };

    match app_state.lobby().snapshot() {
        Ok(snapshot) => Json(json!({
            "uptime_seconds": app_state.uptime().as_secs(),
            "fill_target": app_state.config().matchmaking.fill_target,
            "lobby": snapshot,
        }))
        .into_response(),
        Err(e) => {
            error!("Failed to snapshot lobby: {}", e);
            not_initialized()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt; // for oneshot

    fn create_test_server() -> HealthServer {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        HealthServer::new(HealthServerConfig::default(), collector)
    }

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let server = create_test_server();
        assert_eq!(status_of(server.create_router(), "/").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        collector.record_room_created();

        let server = HealthServer::new(HealthServerConfig::default(), collector);
        let response = server
            .create_router()
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));
    }

    #[tokio::test]
    async fn test_endpoints_without_app_state() {
        let app = create_test_server().create_router();

        for uri in ["/health", "/ready", "/alive", "/stats"] {
            assert_eq!(
                status_of(app.clone(), uri).await,
                StatusCode::SERVICE_UNAVAILABLE,
                "{}",
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_endpoints_follow_running_state() {
        let app_state = Arc::new(AppState::new(AppConfig::default()).unwrap());
        let server = HealthServer::new(HealthServerConfig::default(), app_state.metrics())
            .with_app_state(Arc::clone(&app_state));
        let app = server.create_router();

        assert_eq!(
            status_of(app.clone(), "/alive").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        // Stats are served whether or not the service is running
        assert_eq!(status_of(app.clone(), "/stats").await, StatusCode::OK);

        app_state.set_running(true).await;
        for uri in ["/health", "/ready", "/alive", "/stats"] {
            assert_eq!(status_of(app.clone(), uri).await, StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_404_handling() {
        let server = create_test_server();
        assert_eq!(
            status_of(server.create_router(), "/nonexistent").await,
            StatusCode::NOT_FOUND
        );
    }
}
