//! Bridge server handoff
//!
//! Once a room is promoted, the bridge server that runs the session asks the
//! lobby to validate connecting members, reports readiness queries and
//! finally announces that the session finished.

pub mod gateway;

pub use gateway::BridgeGateway;

use crate::error::Result;
use crate::types::{RoomId, RoomStartupInfo};
use async_trait::async_trait;

/// Queries a bridge transport adapter forwards to the lobby
#[async_trait]
pub trait BridgeHandler: Send + Sync {
    /// Whether the member named by `session_identity` belongs to the
    /// processing room `room_id`
    async fn validate_session(&self, room_id: RoomId, session_identity: &str) -> Result<bool>;

    /// Readiness and size of the processing room `room_id`
    async fn room_startup_info(&self, room_id: RoomId) -> Result<RoomStartupInfo>;

    /// Acknowledge that the session in `room_id` finished
    async fn finish_room(&self, room_id: RoomId, payload: &[u8]) -> Result<bool>;
}
