//! Main application configuration
//!
//! This module defines the configuration structures for the pvp-lobby
//! service, including environment variable loading, TOML file loading and
//! validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub bridge: BridgeSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Number of members that promotes a room
    pub fill_target: usize,
    /// Bounded wait for the fill section before an attempt is dropped
    pub fill_lock_timeout_ms: u64,
}

/// Bridge server the promoted rooms are handed off to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Public identity of the bridge server
    pub identity: String,
    /// Endpoints clients use to reach the bridge server
    pub clients_endpoints: Vec<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "pvp-lobby".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            fill_target: 2,
            fill_lock_timeout_ms: 1000,
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            identity: "bridge-server".to_string(),
            clients_endpoints: vec!["ws://localhost:7000".to_string()],
        }
    }
}

impl MatchmakingSettings {
    /// Get the fill lock timeout as Duration
    pub fn fill_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.fill_lock_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            config.service.health_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HEALTH_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Matchmaking settings
        if let Ok(target) = env::var("FILL_TARGET") {
            config.matchmaking.fill_target = target
                .parse()
                .map_err(|_| anyhow!("Invalid FILL_TARGET value: {}", target))?;
        }
        if let Ok(timeout) = env::var("FILL_LOCK_TIMEOUT_MS") {
            config.matchmaking.fill_lock_timeout_ms = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid FILL_LOCK_TIMEOUT_MS value: {}", timeout))?;
        }

        // Bridge settings
        if let Ok(identity) = env::var("BRIDGE_IDENTITY") {
            config.bridge.identity = identity;
        }
        if let Ok(endpoints) = env::var("BRIDGE_CLIENTS_ENDPOINTS") {
            config.bridge.clients_endpoints = parse_endpoint_list(&endpoints);
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; missing keys fall back to defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Split a comma-separated endpoint list, dropping blanks
fn parse_endpoint_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|endpoint| !endpoint.is_empty())
        .map(str::to_string)
        .collect()
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate matchmaking settings
    if config.matchmaking.fill_target < 2 {
        return Err(anyhow!(
            "Fill target must be at least 2, got {}",
            config.matchmaking.fill_target
        ));
    }
    if config.matchmaking.fill_lock_timeout_ms == 0 {
        return Err(anyhow!("Fill lock timeout must be greater than 0"));
    }

    // Validate bridge settings
    if config.bridge.identity.trim().is_empty() {
        return Err(anyhow!("Bridge identity cannot be empty"));
    }
    if config.bridge.clients_endpoints.is_empty() {
        return Err(anyhow!("At least one bridge client endpoint is required"));
    }

    Ok(())
}
