//! Read-mostly facade over the processing room index

use crate::bridge::BridgeHandler;
use crate::error::Result;
use crate::lobby::{Room, RoomIndex};
use crate::metrics::MetricsCollector;
use crate::types::{RoomId, RoomStartupInfo, RoomState};
use crate::utils::parse_session_identity;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Answers bridge queries against promoted rooms
pub struct BridgeGateway {
    rooms: Arc<RoomIndex>,
    metrics: Arc<MetricsCollector>,
}

impl BridgeGateway {
    pub fn new(rooms: Arc<RoomIndex>, metrics: Arc<MetricsCollector>) -> Self {
        Self { rooms, metrics }
    }

    /// A room is visible to the bridge only once it is processing; the index
    /// holds it a moment before its startup broadcast begins.
    fn processing_room(&self, room_id: RoomId) -> Result<Option<Arc<Room>>> {
        Ok(self
            .rooms
            .get(room_id)?
            .filter(|room| room.state() == RoomState::Processing))
    }
}

#[async_trait]
impl BridgeHandler for BridgeGateway {
    async fn validate_session(&self, room_id: RoomId, session_identity: &str) -> Result<bool> {
        let timer = self.metrics.start_timer();
        let client_id = parse_session_identity(session_identity)?;

        let valid = self
            .processing_room(room_id)?
            .is_some_and(|room| room.exists_member(client_id));

        debug!(
            "Bridge session validation - room: {}, client: {}, valid: {}",
            room_id, client_id, valid
        );
        self.metrics
            .record_bridge_query("validate_session", timer.stop());
        Ok(valid)
    }

    async fn room_startup_info(&self, room_id: RoomId) -> Result<RoomStartupInfo> {
        let timer = self.metrics.start_timer();

        let info = match self.processing_room(room_id)? {
            Some(room) => RoomStartupInfo {
                ready: true,
                member_count: room.member_count(),
            },
            None => RoomStartupInfo::default(),
        };

        self.metrics
            .record_bridge_query("room_startup_info", timer.stop());
        Ok(info)
    }

    async fn finish_room(&self, room_id: RoomId, payload: &[u8]) -> Result<bool> {
        let timer = self.metrics.start_timer();

        if self.processing_room(room_id)?.is_none() {
            debug!("Ignoring finish of unknown room {}", room_id);
            self.metrics.record_bridge_query("finish_room", timer.stop());
            return Ok(false);
        }

        let finished = match self.rooms.remove(room_id)? {
            Some(room) => {
                room.mark_runned();
                self.metrics.record_room_finished();
                info!(
                    "Room {} finished by bridge ({} members, {} byte payload)",
                    room_id,
                    room.member_count(),
                    payload.len()
                );
                true
            }
            None => false,
        };

        self.metrics.record_bridge_query("finish_room", timer.stop());
        Ok(finished)
    }
}
