//! Main application state and service coordination
//!
//! This module contains the production AppState that owns the lobby
//! service, the health server and the background maintenance tasks.

use crate::config::{validate_config, AppConfig};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::service::health::HealthCheck;
use crate::service::lobby::LobbyService;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Registry, matchmaker and bridge gateway
    lobby: Arc<LobbyService>,

    /// Metrics shared by every component
    metrics: Arc<MetricsCollector>,

    /// Health and metrics endpoints, present while running
    health_server: Mutex<Option<Arc<HealthServer>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing pvp-lobby service");
        info!(
            "Configuration: service={}, fill_target={}, bridge={}",
            config.service.name, config.matchmaking.fill_target, config.bridge.identity
        );

        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let lobby = Arc::new(LobbyService::new(&config, Arc::clone(&metrics)));

        Ok(Self {
            config,
            lobby,
            metrics,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Start the health server and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting pvp-lobby service");

        self.set_running(true).await;

        self.start_health_server().await?;
        self.start_background_tasks().await?;

        info!("✅ pvp-lobby service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of pvp-lobby service");

        self.set_running(false).await;

        if let Some(health_server) = self.health_server.lock().await.take() {
            info!("Stopping health server...");
            if let Err(e) = health_server.stop().await {
                warn!("Failed to stop health server: {}", e);
            } else {
                info!("✅ Health server stopped");
            }
        }

        self.stop_background_tasks().await;

        let final_stats = self
            .lobby
            .snapshot()
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ pvp-lobby service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub(crate) async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    /// The transport-facing lobby service
    pub fn lobby(&self) -> Arc<LobbyService> {
        Arc::clone(&self.lobby)
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn start_health_server(self: &Arc<Self>) -> Result<(), ServiceError> {
        let port = self.config.service.health_port;
        info!("Starting health and metrics endpoints on port {}", port);

        let health_config = HealthServerConfig {
            port,
            host: "0.0.0.0".to_string(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, Arc::clone(&self.metrics))
                .with_app_state(Arc::clone(self)),
        );

        let server = Arc::clone(&health_server);
        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Health server failed: {}", e);
            } else {
                info!("Health server task completed");
            }
        });

        *self.health_server.lock().await = Some(health_server);
        self.background_tasks.lock().await.push(handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ Health server started on port {}", port);
        Ok(())
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting background maintenance tasks...");

        info!("Starting lobby metrics update task (15s interval)...");
        let metrics_task = {
            let lobby = Arc::clone(&self.lobby);
            let metrics = Arc::clone(&self.metrics);
            let is_running = Arc::clone(&self.is_running);

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(15));
                info!("Metrics update task started");

                while *is_running.read().await {
                    interval.tick().await;

                    match lobby.snapshot() {
                        Ok(snapshot) => {
                            debug!(
                                "Updating metrics - clients: {}, pending: {}, processing: {}",
                                snapshot.connected_clients,
                                snapshot.matchmaker.pending_members,
                                snapshot.matchmaker.processing_rooms
                            );
                            metrics.update_from_matchmaker_stats(&snapshot.matchmaker);
                        }
                        Err(e) => {
                            warn!("Failed to get lobby stats for metrics update: {}", e);
                        }
                    }
                }

                info!("Metrics update task stopped");
            })
        };

        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let app_state = Arc::downgrade(self);

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                loop {
                    interval.tick().await;

                    let Some(app_state) = app_state.upgrade() else {
                        break;
                    };
                    if !app_state.is_running().await {
                        break;
                    }

                    let metrics = app_state.metrics();
                    let uptime = app_state.uptime();
                    metrics.update_uptime(uptime);

                    match HealthCheck::check(Arc::clone(&app_state)).await {
                        Ok(health) => {
                            health.record(&metrics);
                            debug!(
                                "Updated service health metrics - status: {}, uptime: {}s",
                                health.status,
                                uptime.as_secs()
                            );
                        }
                        Err(e) => {
                            warn!("Health check for metrics update failed: {}", e);
                        }
                    }
                }

                info!("Health metrics task stopped");
            })
        };

        let mut tasks = self.background_tasks.lock().await;
        tasks.push(metrics_task);
        tasks.push(health_metrics_task);

        info!("2 background maintenance tasks started successfully");
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let tasks: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.into_iter().enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
