//! Service layer for the pvp-lobby service
//!
//! This module contains the transport-facing lobby service, the main
//! application state and the health checks built on top of them.

pub mod app;
pub mod health;
pub mod lobby;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use lobby::{LobbyService, LobbySnapshot};
