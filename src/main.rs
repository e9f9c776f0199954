//! pvp-lobby service binary
//!
//! Resolves configuration (file or environment, then command-line
//! overrides), installs logging and runs the lobby with its health endpoints
//! until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use pvp_lobby::config::{validate_config, AppConfig};
use pvp_lobby::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Lobby that pairs searching clients into rooms and hands them to a bridge
#[derive(Parser, Debug)]
#[command(
    name = "pvp-lobby",
    version,
    about = "Lobby service that matches clients into rooms for peer-coordinated sessions",
    long_about = "pvp-lobby seats searching clients in a pending room, promotes the room \
                 once it reaches the fill target and hands it off to a bridge server that \
                 validates the members and runs the session."
)]
struct Args {
    /// Path to a TOML configuration file; the environment is used otherwise
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Members a room needs before it is promoted
    #[arg(long, value_name = "COUNT")]
    fill_target: Option<usize>,

    /// Port of the health and metrics endpoints
    #[arg(long, value_name = "PORT")]
    health_port: Option<u16>,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    debug: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    dry_run: bool,

    /// Start the service, run one health check and exit with its status
    #[arg(long)]
    health_check: bool,
}

impl Args {
    fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::from_env()?,
        };

        if let Some(log_level) = &self.log_level {
            config.service.log_level = log_level.clone();
        }
        if self.debug {
            config.service.log_level = "debug".to_string();
        }
        if let Some(fill_target) = self.fill_target {
            config.matchmaking.fill_target = fill_target;
        }
        if let Some(health_port) = self.health_port {
            config.service.health_port = health_port;
        }

        validate_config(&config).context("Invalid configuration after overrides")?;
        Ok(config)
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

fn log_settings(config: &AppConfig) {
    info!(
        "🚀 {} v{} - fill target {}, fill lock timeout {}ms, health port {}",
        config.service.name,
        pvp_lobby::VERSION,
        config.matchmaking.fill_target,
        config.matchmaking.fill_lock_timeout_ms,
        config.service.health_port
    );
    info!(
        "   Bridge '{}' at {}",
        config.bridge.identity,
        config.bridge.clients_endpoints.join(", ")
    );
}

/// Resolves once SIGINT or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

async fn shutdown(app_state: &AppState) {
    let timeout = app_state.config().shutdown_timeout();
    match tokio::time::timeout(timeout, app_state.shutdown()).await {
        Ok(Ok(())) => info!("✅ Graceful shutdown completed"),
        Ok(Err(e)) => error!("Shutdown failed: {}", e),
        Err(_) => warn!("⚠️  Shutdown did not finish within {:?}", timeout),
    }
}

/// One-shot check used by container health checks
async fn run_health_check(app_state: Arc<AppState>) -> Result<ExitCode> {
    app_state.start().await?;
    let health = HealthCheck::check(Arc::clone(&app_state)).await;
    shutdown(&app_state).await;

    let health = health?;
    println!("{}", health.to_json()?);
    Ok(if health.status == HealthStatus::Unhealthy {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    log_settings(&config);
    if args.dry_run {
        info!("Configuration is valid, exiting (dry run)");
        return ExitCode::SUCCESS;
    }

    let app_state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize service: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.health_check {
        return match run_health_check(app_state).await {
            Ok(code) => code,
            Err(e) => {
                error!("Health check failed: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        return ExitCode::FAILURE;
    }
    info!("✅ pvp-lobby is running, press Ctrl+C to stop");

    shutdown_signal().await;
    shutdown(&app_state).await;

    info!("🛑 pvp-lobby stopped");
    ExitCode::SUCCESS
}
