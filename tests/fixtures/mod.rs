//! Test fixtures shared by the integration and load suites

use pvp_lobby::client::Client;
use pvp_lobby::config::AppConfig;
use pvp_lobby::metrics::MetricsCollector;
use pvp_lobby::network::RecordingPacketSender;
use pvp_lobby::types::StartupRoomInfo;
use pvp_lobby::LobbyService;
use std::sync::Arc;

/// A connected test client together with the packets it received
pub struct TestClient {
    pub client: Arc<Client>,
    pub sender: Arc<RecordingPacketSender>,
}

impl TestClient {
    /// The single startup packet this client should have received
    pub fn startup(&self) -> StartupRoomInfo {
        let packets = self.sender.startup_packets();
        assert_eq!(
            packets.len(),
            1,
            "client {} expected exactly one startup packet",
            self.client.id()
        );
        packets[0].clone()
    }

    pub fn received_nothing(&self) -> bool {
        self.sender.packets().is_empty()
    }
}

/// Build a lobby with default settings and the given fill target
pub fn create_test_service(fill_target: usize) -> Arc<LobbyService> {
    let mut config = AppConfig::default();
    config.matchmaking.fill_target = fill_target;
    config.bridge.identity = "test-bridge".to_string();
    config.bridge.clients_endpoints = vec![
        "ws://bridge-a:7000".to_string(),
        "ws://bridge-b:7000".to_string(),
    ];

    let metrics = Arc::new(MetricsCollector::new().expect("Failed to create metrics collector"));
    Arc::new(LobbyService::new(&config, metrics))
}

/// Connect a client whose outbound packets are recorded
pub fn connect(lobby: &LobbyService) -> TestClient {
    let sender = Arc::new(RecordingPacketSender::new());
    let client = lobby
        .on_client_connected(sender.clone())
        .expect("Failed to connect client");
    TestClient { client, sender }
}

/// Connect several recorded clients
pub fn connect_many(lobby: &LobbyService, count: usize) -> Vec<TestClient> {
    (0..count).map(|_| connect(lobby)).collect()
}
