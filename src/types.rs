//! Common types used throughout the lobby service

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-assigned identity of a connected client
pub type ClientId = Uuid;

/// Identifier of a promoted room
pub type RoomId = Uuid;

/// Lifecycle state of a room. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomState {
    /// Accepting members, not yet promoted
    Lobby,
    /// Filled and handed off to the bridge
    Processing,
    /// The bridge reported the session finished
    Runned,
}

impl std::fmt::Display for RoomState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomState::Lobby => write!(f, "Lobby"),
            RoomState::Processing => write!(f, "Processing"),
            RoomState::Runned => write!(f, "Runned"),
        }
    }
}

/// Packets a client sends to the lobby
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientPacket {
    FindOpponent,
    CancelSearch,
}

/// Sent to every member of a room the moment it is promoted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupRoomInfo {
    pub room_id: RoomId,
    /// Colon-delimited; the first field is the receiving member's identity
    pub session_identity: String,
    pub bridge_identity: String,
    pub bridge_endpoints: Vec<String>,
    pub member_count: usize,
}

/// Packets the lobby sends to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerPacket {
    StartupRoomInfo(StartupRoomInfo),
}

/// Answer to a bridge startup-info query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomStartupInfo {
    pub ready: bool,
    pub member_count: usize,
}
