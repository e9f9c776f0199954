//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the pvp-lobby service using
//! Prometheus metrics.

use crate::lobby::MatchmakerStats;
use anyhow::{Context, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the lobby service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Search-related metrics
    search_metrics: SearchMetrics,

    /// Room-related metrics
    room_metrics: RoomMetrics,

    /// Client-related metrics
    client_metrics: ClientMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Client packets handled
    pub packets_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Search-related metrics
#[derive(Clone)]
pub struct SearchMetrics {
    /// Find-opponent requests received
    pub searches_started_total: IntCounter,

    /// Completed searches by outcome
    pub search_outcomes_total: IntCounterVec,

    /// Searches aborted at a cancellation checkpoint
    pub searches_cancelled_total: IntCounterVec,

    /// Searches dropped because the fill lock could not be acquired
    pub lock_timeouts_total: IntCounter,

    /// Members seated in the pending room
    pub pending_room_members: IntGauge,
}

/// Room-related metrics
#[derive(Clone)]
pub struct RoomMetrics {
    /// Pending rooms created
    pub rooms_created_total: IntCounter,

    /// Rooms promoted to processing
    pub rooms_promoted_total: IntCounter,

    /// Pending rooms dropped after every member left
    pub rooms_abandoned_total: IntCounter,

    /// Rooms finished by the bridge
    pub rooms_finished_total: IntCounter,

    /// Rooms currently handed off to the bridge
    pub rooms_processing: IntGauge,

    /// Time from room creation to promotion
    pub room_fill_time_seconds: Histogram,

    /// Startup packets by delivery status
    pub startup_packets_total: IntCounterVec,
}

/// Client-related metrics
#[derive(Clone)]
pub struct ClientMetrics {
    /// Clients currently connected
    pub clients_connected: IntGauge,

    /// Total connections accepted
    pub connections_total: IntCounter,

    /// Total disconnections
    pub disconnections_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// End-to-end find-opponent duration
    pub find_opponent_duration: Histogram,

    /// Time spent waiting for the fill lock
    pub fill_lock_wait_duration: Histogram,

    /// Bridge query durations
    pub bridge_query_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let search_metrics = SearchMetrics::new(&registry)?;
        let room_metrics = RoomMetrics::new(&registry)?;
        let client_metrics = ClientMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            search_metrics,
            room_metrics,
            client_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Encode every registered metric in the Prometheus text format
    pub fn render_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn search(&self) -> &SearchMetrics {
        &self.search_metrics
    }

    pub fn room(&self) -> &RoomMetrics {
        &self.room_metrics
    }

    pub fn client(&self) -> &ClientMetrics {
        &self.client_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh gauges from a matchmaker stats snapshot
    pub fn update_from_matchmaker_stats(&self, stats: &MatchmakerStats) {
        self.search_metrics
            .pending_room_members
            .set(stats.pending_members as i64);
        self.room_metrics
            .rooms_processing
            .set(stats.processing_rooms as i64);
    }

    pub fn record_search_started(&self) {
        self.search_metrics.searches_started_total.inc();
    }

    /// Record a finished find-opponent call
    pub fn record_search_outcome(&self, outcome: &str, duration: Duration) {
        self.search_metrics
            .search_outcomes_total
            .with_label_values(&[outcome])
            .inc();

        self.performance_metrics
            .find_opponent_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_search_cancelled(&self, checkpoint: &str) {
        self.search_metrics
            .searches_cancelled_total
            .with_label_values(&[checkpoint])
            .inc();
    }

    pub fn record_lock_timeout(&self) {
        self.search_metrics.lock_timeouts_total.inc();
    }

    pub fn record_lock_wait(&self, duration: Duration) {
        self.performance_metrics
            .fill_lock_wait_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_room_created(&self) {
        self.room_metrics.rooms_created_total.inc();
    }

    /// Record a promotion and the outcome of its startup broadcast
    pub fn record_room_promoted(&self, fill_time: Duration, delivered: usize, failed: usize) {
        self.room_metrics.rooms_promoted_total.inc();
        self.room_metrics.rooms_processing.inc();
        self.room_metrics
            .room_fill_time_seconds
            .observe(fill_time.as_secs_f64());

        self.room_metrics
            .startup_packets_total
            .with_label_values(&["delivered"])
            .inc_by(delivered as u64);
        self.room_metrics
            .startup_packets_total
            .with_label_values(&["failed"])
            .inc_by(failed as u64);
    }

    pub fn record_room_abandoned(&self) {
        self.room_metrics.rooms_abandoned_total.inc();
    }

    pub fn record_room_finished(&self) {
        self.room_metrics.rooms_finished_total.inc();
        self.room_metrics.rooms_processing.dec();
    }

    pub fn set_pending_members(&self, members: usize) {
        self.search_metrics.pending_room_members.set(members as i64);
    }

    pub fn record_client_connected(&self, connected: usize) {
        self.client_metrics.connections_total.inc();
        self.client_metrics.clients_connected.set(connected as i64);
    }

    pub fn record_client_disconnected(&self, connected: usize) {
        self.client_metrics.disconnections_total.inc();
        self.client_metrics.clients_connected.set(connected as i64);
    }

    /// Record a client packet being handled
    pub fn record_packet(&self, packet: &str, success: bool) {
        let status = if success { "success" } else { "error" };

        self.service_metrics
            .packets_total
            .with_label_values(&[packet, status])
            .inc();
    }

    pub fn record_bridge_query(&self, query: &str, duration: Duration) {
        self.performance_metrics
            .bridge_query_duration
            .with_label_values(&[query])
            .observe(duration.as_secs_f64());
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("pvp_lobby_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let packets_total = IntCounterVec::new(
            Opts::new("pvp_lobby_packets_total", "Client packets handled"),
            &["packet", "status"],
        )?;
        registry.register(Box::new(packets_total.clone()))?;

        let health_status = IntGauge::new(
            "pvp_lobby_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("pvp_lobby_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            packets_total,
            health_status,
            component_health,
        })
    }
}

impl SearchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let searches_started_total = IntCounter::new(
            "pvp_lobby_searches_started_total",
            "Find-opponent requests received",
        )?;
        registry.register(Box::new(searches_started_total.clone()))?;

        let search_outcomes_total = IntCounterVec::new(
            Opts::new(
                "pvp_lobby_search_outcomes_total",
                "Completed searches by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(search_outcomes_total.clone()))?;

        let searches_cancelled_total = IntCounterVec::new(
            Opts::new(
                "pvp_lobby_searches_cancelled_total",
                "Searches aborted at a cancellation checkpoint",
            ),
            &["checkpoint"],
        )?;
        registry.register(Box::new(searches_cancelled_total.clone()))?;

        let lock_timeouts_total = IntCounter::new(
            "pvp_lobby_fill_lock_timeouts_total",
            "Searches dropped on fill lock timeout",
        )?;
        registry.register(Box::new(lock_timeouts_total.clone()))?;

        let pending_room_members = IntGauge::new(
            "pvp_lobby_pending_room_members",
            "Members seated in the pending room",
        )?;
        registry.register(Box::new(pending_room_members.clone()))?;

        Ok(Self {
            searches_started_total,
            search_outcomes_total,
            searches_cancelled_total,
            lock_timeouts_total,
            pending_room_members,
        })
    }
}

impl RoomMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rooms_created_total =
            IntCounter::new("pvp_lobby_rooms_created_total", "Pending rooms created")?;
        registry.register(Box::new(rooms_created_total.clone()))?;

        let rooms_promoted_total = IntCounter::new(
            "pvp_lobby_rooms_promoted_total",
            "Rooms promoted to processing",
        )?;
        registry.register(Box::new(rooms_promoted_total.clone()))?;

        let rooms_abandoned_total = IntCounter::new(
            "pvp_lobby_rooms_abandoned_total",
            "Pending rooms dropped after every member left",
        )?;
        registry.register(Box::new(rooms_abandoned_total.clone()))?;

        let rooms_finished_total = IntCounter::new(
            "pvp_lobby_rooms_finished_total",
            "Rooms finished by the bridge",
        )?;
        registry.register(Box::new(rooms_finished_total.clone()))?;

        let rooms_processing = IntGauge::new(
            "pvp_lobby_rooms_processing",
            "Rooms currently handed off to the bridge",
        )?;
        registry.register(Box::new(rooms_processing.clone()))?;

        let room_fill_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "pvp_lobby_room_fill_time_seconds",
                "Time from room creation to promotion",
            )
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0]),
        )?;
        registry.register(Box::new(room_fill_time_seconds.clone()))?;

        let startup_packets_total = IntCounterVec::new(
            Opts::new(
                "pvp_lobby_startup_packets_total",
                "Startup packets by delivery status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(startup_packets_total.clone()))?;

        Ok(Self {
            rooms_created_total,
            rooms_promoted_total,
            rooms_abandoned_total,
            rooms_finished_total,
            rooms_processing,
            room_fill_time_seconds,
            startup_packets_total,
        })
    }
}

impl ClientMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let clients_connected =
            IntGauge::new("pvp_lobby_clients_connected", "Clients currently connected")?;
        registry.register(Box::new(clients_connected.clone()))?;

        let connections_total = IntCounter::new(
            "pvp_lobby_connections_total",
            "Total connections accepted",
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let disconnections_total =
            IntCounter::new("pvp_lobby_disconnections_total", "Total disconnections")?;
        registry.register(Box::new(disconnections_total.clone()))?;

        Ok(Self {
            clients_connected,
            connections_total,
            disconnections_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let find_opponent_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pvp_lobby_find_opponent_duration_seconds",
                "Find-opponent processing time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(find_opponent_duration.clone()))?;

        let fill_lock_wait_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pvp_lobby_fill_lock_wait_duration_seconds",
                "Time spent waiting for the fill lock",
            )
            .buckets(vec![0.0001, 0.001, 0.01, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(fill_lock_wait_duration.clone()))?;

        let bridge_query_duration = HistogramVec::new(
            HistogramOpts::new(
                "pvp_lobby_bridge_query_duration_seconds",
                "Bridge query duration",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1]),
            &["query"],
        )?;
        registry.register(Box::new(bridge_query_duration.clone()))?;

        Ok(Self {
            find_opponent_duration,
            fill_lock_wait_duration,
            bridge_query_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(collector: &MetricsCollector) -> String {
        collector.render_text().expect("Failed to render metrics")
    }

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _search = collector.search();
        let _room = collector.room();
        let _client = collector.client();
        let _performance = collector.performance();
    }

    #[test]
    fn test_collectors_do_not_share_registries() {
        let first = MetricsCollector::new().expect("Failed to create metrics collector");
        let second = MetricsCollector::new().expect("Failed to create metrics collector");

        first.record_search_started();
        assert_eq!(first.search().searches_started_total.get(), 1);
        assert_eq!(second.search().searches_started_total.get(), 0);
    }

    #[test]
    fn test_room_lifecycle_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_room_created();
        collector.record_room_promoted(Duration::from_millis(250), 1, 1);
        assert_eq!(collector.room().rooms_processing.get(), 1);

        collector.record_room_finished();
        assert_eq!(collector.room().rooms_processing.get(), 0);
        assert_eq!(collector.room().rooms_finished_total.get(), 1);

        let text = render(&collector);
        assert!(text.contains("pvp_lobby_startup_packets_total{status=\"failed\"} 1"));
    }

    #[test]
    fn test_search_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_search_started();
        collector.record_search_cancelled("before_promotion");
        collector.record_lock_timeout();
        collector.record_search_outcome("waiting", Duration::from_millis(2));

        assert_eq!(
            collector
                .search()
                .searches_cancelled_total
                .with_label_values(&["before_promotion"])
                .get(),
            1
        );
        assert_eq!(collector.search().lock_timeouts_total.get(), 1);
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.update_health_status(2);
        collector.update_component_health("matchmaker", true);
        collector.update_component_health("bridge_gateway", false);

        assert_eq!(collector.service().health_status.get(), 2);
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.elapsed();

        assert!(duration >= Duration::from_millis(10));

        let final_duration = timer.stop();
        assert!(final_duration >= Duration::from_millis(10));
    }
}
