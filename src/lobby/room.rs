//! Room lifecycle: membership, state transitions and the startup broadcast

use crate::client::Client;
use crate::config::BridgeSettings;
use crate::error::{LobbyError, Result};
use crate::types::{ClientId, RoomId, RoomState, ServerPacket, StartupRoomInfo};
use crate::utils::{current_timestamp, session_identity_for};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// A client seated in a room
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub client: Arc<Client>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug)]
struct RoomInner {
    id: Option<RoomId>,
    state: RoomState,
    members: HashMap<ClientId, RoomMember>,
    started_at: Option<DateTime<Utc>>,
}

/// A room that fills in `Lobby` state and is handed off once promoted.
///
/// State, id and members share one lock so that a member count read can
/// never interleave with a promotion or a leave.
#[derive(Debug)]
pub struct Room {
    created_at: DateTime<Utc>,
    inner: RwLock<RoomInner>,
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}

impl Room {
    /// Create an empty room in `Lobby` state; its id is assigned on promotion
    pub fn new() -> Self {
        Self {
            created_at: current_timestamp(),
            inner: RwLock::new(RoomInner {
                id: None,
                state: RoomState::Lobby,
                members: HashMap::new(),
                started_at: None,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RoomInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RoomInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seat a client. Returns `false` if it is already a member.
    pub fn add_member(self: &Arc<Self>, client: &Arc<Client>) -> Result<bool> {
        let mut inner = self.write();

        if inner.state != RoomState::Lobby {
            return Err(LobbyError::RoomNotAccepting {
                room: describe(inner.id),
                state: inner.state.to_string(),
            }
            .into());
        }

        if inner.members.contains_key(&client.id()) {
            debug!("Client {} already seated in room", client.id());
            return Ok(false);
        }

        inner.members.insert(
            client.id(),
            RoomMember {
                client: Arc::clone(client),
                joined_at: current_timestamp(),
            },
        );
        client.set_current_room(self);

        debug!(
            "Client {} joined room - members: {}",
            client.id(),
            inner.members.len()
        );
        Ok(true)
    }

    /// Release a client from a room that has not started yet.
    ///
    /// Returns `false` if the client was not a member or the room already
    /// left `Lobby`; mid-session departures are the bridge's business.
    pub fn leave_member(&self, client: &Client) -> bool {
        let mut inner = self.write();

        if inner.state != RoomState::Lobby {
            debug!(
                "Client {} stays in room {} (state: {})",
                client.id(),
                describe(inner.id),
                inner.state
            );
            return false;
        }

        if inner.members.remove(&client.id()).is_none() {
            return false;
        }
        client.clear_current_room(self);

        debug!(
            "Client {} left room - members: {}",
            client.id(),
            inner.members.len()
        );
        true
    }

    /// Promote the room to `Processing` under `room_id` and send every member
    /// its startup packet. Returns how many packets were delivered.
    pub async fn start_room(&self, room_id: RoomId, bridge: &BridgeSettings) -> Result<usize> {
        let members = self.promote(room_id)?;
        Ok(self.broadcast_start_room(room_id, &members, bridge).await)
    }

    /// Switch the room to `Processing` under `room_id` and snapshot the
    /// members that must be told about it. No packet is sent.
    pub fn promote(&self, room_id: RoomId) -> Result<Vec<Arc<Client>>> {
        let mut inner = self.write();

        if inner.state != RoomState::Lobby {
            return Err(LobbyError::RoomNotAccepting {
                room: describe(inner.id),
                state: inner.state.to_string(),
            }
            .into());
        }

        inner.id = Some(room_id);
        inner.state = RoomState::Processing;
        inner.started_at = Some(current_timestamp());

        info!(
            "Room {} started with {} members",
            room_id,
            inner.members.len()
        );

        Ok(inner
            .members
            .values()
            .map(|member| Arc::clone(&member.client))
            .collect())
    }

    /// Send the startup packet to each of `members`. A failed send is logged
    /// and skipped. Returns how many packets were delivered.
    pub async fn broadcast_start_room(
        &self,
        room_id: RoomId,
        members: &[Arc<Client>],
        bridge: &BridgeSettings,
    ) -> usize {
        let member_count = members.len();
        let mut delivered = 0;

        debug!(
            "Handing room {} off to bridge '{}'",
            room_id, bridge.identity
        );

        for client in members {
            let packet = ServerPacket::StartupRoomInfo(StartupRoomInfo {
                room_id,
                session_identity: session_identity_for(client.id()),
                bridge_identity: bridge.identity.clone(),
                bridge_endpoints: bridge.clients_endpoints.clone(),
                member_count,
            });

            match client.send(packet).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "Failed to send startup packet for room {} to client {}: {}",
                    room_id,
                    client.id(),
                    e
                ),
            }
        }

        delivered
    }

    /// Mark the session as finished. Returns `false` unless the room was
    /// `Processing`.
    pub fn mark_runned(&self) -> bool {
        let mut inner = self.write();
        if inner.state != RoomState::Processing {
            return false;
        }
        inner.state = RoomState::Runned;
        true
    }

    pub fn exists_member(&self, client_id: ClientId) -> bool {
        self.read().members.contains_key(&client_id)
    }

    pub fn member_count(&self) -> usize {
        self.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_count() == 0
    }

    /// Identities of the current members
    pub fn member_ids(&self) -> Vec<ClientId> {
        self.read().members.keys().copied().collect()
    }

    /// Snapshot of the current members
    pub fn members(&self) -> Vec<RoomMember> {
        self.read().members.values().cloned().collect()
    }

    pub fn state(&self) -> RoomState {
        self.read().state
    }

    /// The room id, assigned at promotion
    pub fn id(&self) -> Option<RoomId> {
        self.read().id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.read().started_at
    }
}

fn describe(id: Option<RoomId>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "<pending>".to_string())
}
