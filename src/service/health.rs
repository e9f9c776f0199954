//! Health checks and monitoring
//!
//! This module provides health check functionality for the pvp-lobby
//! service, including readiness and liveness checks.

use crate::metrics::MetricsCollector;
use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// How long the readiness check waits for the fill section
const FILL_SECTION_CHECK_TIMEOUT: Duration = Duration::from_millis(250);

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

impl HealthStatus {
    /// Value published on the `health_status` gauge
    pub fn gauge_value(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub connected_clients: usize,
    pub pending_members: usize,
    pub processing_rooms: usize,
    pub searches_started: u64,
    pub rooms_promoted: u64,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a full health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        let matchmaker_check = Self::check_matchmaker(&app_state).await;
        if matchmaker_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if matchmaker_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(matchmaker_check);

        let stats = Self::gather_service_stats(&app_state);

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_matchmaker(&app_state).await.status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The matchmaker is degraded when its fill section stays busy
    async fn check_matchmaker(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();
        let matchmaker = app_state.lobby().matchmaker();

        let (status, message) = match matchmaker.stats() {
            Ok(_) => {
                match tokio::time::timeout(
                    FILL_SECTION_CHECK_TIMEOUT,
                    matchmaker.pending_member_count(),
                )
                .await
                {
                    Ok(_) => (HealthStatus::Healthy, None),
                    Err(_) => (
                        HealthStatus::Degraded,
                        Some("Fill section busy".to_string()),
                    ),
                }
            }
            Err(e) => {
                error!("Matchmaker stats check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "matchmaker".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let uptime_seconds = app_state.uptime().as_secs();

        match app_state.lobby().snapshot() {
            Ok(snapshot) => ServiceStats {
                connected_clients: snapshot.connected_clients,
                pending_members: snapshot.matchmaker.pending_members,
                processing_rooms: snapshot.matchmaker.processing_rooms,
                searches_started: snapshot.matchmaker.searches_started,
                rooms_promoted: snapshot.matchmaker.rooms_promoted,
                uptime_seconds,
            },
            Err(e) => {
                debug!("Failed to get lobby stats for health check: {}", e);
                ServiceStats {
                    uptime_seconds,
                    ..ServiceStats::default()
                }
            }
        }
    }

    /// Publish the overall and per-component status as gauges
    pub fn record(&self, metrics: &MetricsCollector) {
        metrics.update_health_status(self.status.gauge_value());
        for check in &self.checks {
            metrics.update_component_health(&check.name, check.status != HealthStatus::Unhealthy);
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn create_test_app() -> Arc<AppState> {
        Arc::new(AppState::new(AppConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_stopped_service_is_unhealthy() {
        let app = create_test_app();

        assert_eq!(
            HealthCheck::liveness_check(app.clone()).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::readiness_check(app.clone()).await.unwrap(),
            HealthStatus::Unhealthy
        );

        let health = HealthCheck::check(app).await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.service, "pvp-lobby");
    }

    #[tokio::test]
    async fn test_running_service_is_healthy() {
        let app = create_test_app();
        app.set_running(true).await;

        assert_eq!(
            HealthCheck::readiness_check(app.clone()).await.unwrap(),
            HealthStatus::Healthy
        );

        let health = HealthCheck::check(app).await.unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.checks.len(), 2);

        let json = health.to_json().unwrap();
        assert!(json.contains("\"matchmaker\""));
    }

    #[tokio::test]
    async fn test_recorded_gauges_follow_service_state() {
        let app = create_test_app();
        let metrics = app.metrics();
        let component = |name: &str| {
            metrics
                .service()
                .component_health
                .with_label_values(&[name])
                .get()
        };

        HealthCheck::check(app.clone()).await.unwrap().record(&metrics);
        assert_eq!(metrics.service().health_status.get(), 0);
        assert_eq!(component("service_running"), 0);
        assert_eq!(component("matchmaker"), 1);

        app.set_running(true).await;
        HealthCheck::check(app).await.unwrap().record(&metrics);
        assert_eq!(metrics.service().health_status.get(), 2);
        assert_eq!(component("service_running"), 1);
    }
}
