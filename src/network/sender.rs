//! Outbound packet delivery to a single client

use crate::error::{LobbyError, Result};
use crate::types::{ServerPacket, StartupRoomInfo};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Send primitive the transport provides for each connected client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PacketSender: Send + Sync {
    /// Queue a packet for delivery; no acknowledgement is awaited
    async fn send(&self, packet: ServerPacket) -> Result<()>;
}

/// Sender backed by an unbounded channel drained by the connection task
#[derive(Debug, Clone)]
pub struct ChannelPacketSender {
    tx: mpsc::UnboundedSender<ServerPacket>,
}

impl ChannelPacketSender {
    /// Create a sender together with the receiving half for the connection task
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerPacket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PacketSender for ChannelPacketSender {
    async fn send(&self, packet: ServerPacket) -> Result<()> {
        self.tx.send(packet).map_err(|_| {
            LobbyError::ClientDisconnected {
                client_id: "connection channel closed".to_string(),
            }
            .into()
        })
    }
}

/// Sender that keeps every packet in memory
#[derive(Debug, Default)]
pub struct RecordingPacketSender {
    packets: Mutex<Vec<ServerPacket>>,
}

impl RecordingPacketSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all packets sent so far
    pub fn packets(&self) -> Vec<ServerPacket> {
        self.packets
            .lock()
            .map(|packets| packets.clone())
            .unwrap_or_default()
    }

    /// Startup packets only
    pub fn startup_packets(&self) -> Vec<StartupRoomInfo> {
        self.packets()
            .into_iter()
            .map(|packet| match packet {
                ServerPacket::StartupRoomInfo(info) => info,
            })
            .collect()
    }

    /// Clear recorded packets
    pub fn clear(&self) {
        if let Ok(mut packets) = self.packets.lock() {
            packets.clear();
        }
    }
}

#[async_trait]
impl PacketSender for RecordingPacketSender {
    async fn send(&self, packet: ServerPacket) -> Result<()> {
        if let Ok(mut packets) = self.packets.lock() {
            packets.push(packet);
        }
        Ok(())
    }
}
