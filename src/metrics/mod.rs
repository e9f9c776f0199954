//! Metrics and monitoring for the pvp-lobby service
//!
//! This module provides Prometheus metrics collection and the HTTP server
//! that exposes health checks and the metrics endpoint.

pub mod collector;
pub mod health;

pub use collector::{
    ClientMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, RoomMetrics, SearchMetrics,
    ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
