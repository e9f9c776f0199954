//! Transport-facing lobby service
//!
//! The connection transport calls into [`LobbyService`] on connect, on
//! disconnect and for every inbound packet. The service wires the client
//! registry, the matchmaker and the bridge gateway together.

use crate::bridge::{BridgeGateway, BridgeHandler};
use crate::client::{Client, ClientRegistry};
use crate::config::AppConfig;
use crate::error::Result;
use crate::lobby::{Matchmaker, MatchmakerStats, SearchOutcome};
use crate::metrics::MetricsCollector;
use crate::network::{PacketCodec, PacketSender};
use crate::types::ClientPacket;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Snapshot of the lobby for health and stats reporting
#[derive(Debug, Clone, Serialize)]
pub struct LobbySnapshot {
    pub connected_clients: usize,
    pub matchmaker: MatchmakerStats,
}

/// The lobby as seen by the connection transport and the bridge
pub struct LobbyService {
    registry: ClientRegistry,
    matchmaker: Arc<Matchmaker>,
    gateway: Arc<BridgeGateway>,
    metrics: Arc<MetricsCollector>,
}

impl LobbyService {
    pub fn new(config: &AppConfig, metrics: Arc<MetricsCollector>) -> Self {
        let matchmaker = Arc::new(Matchmaker::new(
            config.matchmaking.clone(),
            config.bridge.clone(),
            Arc::clone(&metrics),
        ));
        let gateway = Arc::new(BridgeGateway::new(
            matchmaker.rooms(),
            Arc::clone(&metrics),
        ));

        info!(
            "Lobby service ready - fill_target: {}, bridge: '{}' ({} endpoints)",
            config.matchmaking.fill_target,
            config.bridge.identity,
            config.bridge.clients_endpoints.len()
        );

        Self {
            registry: ClientRegistry::new(),
            matchmaker,
            gateway,
            metrics,
        }
    }

    /// A new connection was accepted
    pub fn on_client_connected(&self, sender: Arc<dyn PacketSender>) -> Result<Arc<Client>> {
        let client = self.registry.register(sender)?;
        self.metrics.record_client_connected(self.registry.len());
        Ok(client)
    }

    /// A connection closed. An absent client handle is a no-op.
    pub async fn on_client_disconnected(&self, client: Option<&Arc<Client>>) -> Result<()> {
        let Some(client) = client else {
            debug!("Ignoring disconnect without a client handle");
            return Ok(());
        };

        // The connection is gone whatever happens to its search
        if self.registry.unregister(client.id())?.is_some() {
            self.metrics.record_client_disconnected(self.registry.len());
        }

        if let Err(e) = self.matchmaker.abandon_search(client).await {
            error!(
                "Failed to withdraw client {} from matchmaking: {}",
                client.id(),
                e
            );
            return Err(e);
        }
        Ok(())
    }

    /// Dispatch an inbound packet. Returns the search outcome for
    /// `FindOpponent`.
    pub async fn handle_packet(
        &self,
        client: &Arc<Client>,
        packet: ClientPacket,
    ) -> Result<Option<SearchOutcome>> {
        let (name, result) = match packet {
            ClientPacket::FindOpponent => (
                "find_opponent",
                self.matchmaker.find_opponent(client).await.map(Some),
            ),
            ClientPacket::CancelSearch => (
                "cancel_search",
                self.matchmaker.abandon_search(client).await.map(|_| None),
            ),
        };

        self.metrics.record_packet(name, result.is_ok());
        if let Err(e) = &result {
            error!("Failed to handle {} from client {}: {}", name, client.id(), e);
        }
        result
    }

    /// Decode and dispatch a raw inbound packet
    pub async fn handle_packet_bytes(
        &self,
        client: &Arc<Client>,
        bytes: &[u8],
    ) -> Result<Option<SearchOutcome>> {
        let packet = match PacketCodec::decode_client_packet(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.metrics.record_packet("malformed", false);
                debug!("Dropping malformed packet from client {}: {}", client.id(), e);
                return Err(e);
            }
        };

        self.handle_packet(client, packet).await
    }

    /// Handler for the bridge transport adapter
    pub fn bridge(&self) -> Arc<dyn BridgeHandler> {
        Arc::clone(&self.gateway) as Arc<dyn BridgeHandler>
    }

    pub fn matchmaker(&self) -> Arc<Matchmaker> {
        Arc::clone(&self.matchmaker)
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn snapshot(&self) -> Result<LobbySnapshot> {
        Ok(LobbySnapshot {
            connected_clients: self.registry.len(),
            matchmaker: self.matchmaker.stats()?,
        })
    }
}
