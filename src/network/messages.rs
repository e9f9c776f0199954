//! Packet serialization

use crate::error::{LobbyError, Result};
use crate::types::{ClientPacket, ServerPacket};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// JSON codec for lobby packets
pub struct PacketCodec;

impl PacketCodec {
    /// Serialize any packet to bytes
    pub fn encode<T: Serialize>(packet: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(packet).map_err(|e| {
            LobbyError::InternalError {
                message: format!("Failed to serialize packet: {}", e),
            }
            .into()
        })
    }

    /// Deserialize any packet from bytes
    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| {
            LobbyError::InvalidPacket {
                reason: format!("Failed to deserialize packet: {}", e),
            }
            .into()
        })
    }

    /// Decode an inbound client packet
    pub fn decode_client_packet(bytes: &[u8]) -> Result<ClientPacket> {
        Self::decode(bytes)
    }

    /// Encode an outbound server packet
    pub fn encode_server_packet(packet: &ServerPacket) -> Result<Vec<u8>> {
        Self::encode(packet)
    }
}
