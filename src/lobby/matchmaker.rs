//! Serialized room fill loop
//!
//! The matchmaker owns a single pending room. Every find-opponent request
//! enters one critical section, guarded by an async mutex acquired with a
//! bounded wait, where it is seated in the pending room; the request that
//! brings the room to the fill target promotes it and hands it off to the
//! bridge. Searches are cooperative: the attempt's cancellation handle is
//! tested at each [`Checkpoint`] and a cancelled attempt undoes its own
//! placement before returning.

use crate::client::{Client, SearchAttempt};
use crate::config::{BridgeSettings, MatchmakingSettings};
use crate::error::{LobbyError, Result};
use crate::lobby::index::RoomIndex;
use crate::lobby::room::Room;
use crate::metrics::MetricsCollector;
use crate::types::{RoomId, RoomState};
use crate::utils::current_timestamp;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Points in the fill section where a cancelled search is abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    BeforeRoomLookup,
    BeforeAddMember,
    BeforeFillCheck,
    BeforePromotion,
}

impl Checkpoint {
    pub fn label(&self) -> &'static str {
        match self {
            Checkpoint::BeforeRoomLookup => "before_room_lookup",
            Checkpoint::BeforeAddMember => "before_add_member",
            Checkpoint::BeforeFillCheck => "before_fill_check",
            Checkpoint::BeforePromotion => "before_promotion",
        }
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What a find-opponent request ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Seated in the pending room, which is not full yet
    Waiting { member_count: usize },
    /// Filled the pending room, which is now processing under `room_id`
    Promoted { room_id: RoomId, member_count: usize },
    /// The client already belongs to a room
    AlreadyInRoom,
    /// The attempt was cancelled and rolled back
    Cancelled { checkpoint: Checkpoint },
    /// The fill section stayed busy for the whole bounded wait
    LockTimeout,
}

impl SearchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SearchOutcome::Waiting { .. } => "waiting",
            SearchOutcome::Promoted { .. } => "promoted",
            SearchOutcome::AlreadyInRoom => "already_in_room",
            SearchOutcome::Cancelled { .. } => "cancelled",
            SearchOutcome::LockTimeout => "lock_timeout",
        }
    }
}

/// Statistics about matchmaker operations
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchmakerStats {
    /// Total find-opponent requests
    pub searches_started: u64,
    /// Searches aborted at a checkpoint
    pub searches_cancelled: u64,
    /// Searches dropped on fill lock timeout
    pub lock_timeouts: u64,
    /// Pending rooms created
    pub rooms_created: u64,
    /// Rooms promoted to processing
    pub rooms_promoted: u64,
    /// Pending rooms dropped after every member left
    pub rooms_abandoned: u64,
    /// Members currently seated in the pending room
    pub pending_members: usize,
    /// Rooms currently handed off to the bridge
    pub processing_rooms: usize,
}

/// The serialized fill loop
pub struct Matchmaker {
    settings: MatchmakingSettings,
    bridge: BridgeSettings,
    /// The single room accepting members, if any
    pending: Mutex<Option<Arc<Room>>>,
    /// Promoted rooms, shared with the bridge gateway
    rooms: Arc<RoomIndex>,
    stats: RwLock<MatchmakerStats>,
    metrics: Arc<MetricsCollector>,
    #[cfg(test)]
    cancel_at: std::sync::Mutex<Option<Checkpoint>>,
}

impl Matchmaker {
    pub fn new(
        settings: MatchmakingSettings,
        bridge: BridgeSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self::with_index(settings, bridge, Arc::new(RoomIndex::new()), metrics)
    }

    /// Create a matchmaker that promotes into an existing room index
    pub fn with_index(
        settings: MatchmakingSettings,
        bridge: BridgeSettings,
        rooms: Arc<RoomIndex>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            settings,
            bridge,
            pending: Mutex::new(None),
            rooms,
            stats: RwLock::new(MatchmakerStats::default()),
            metrics,
            #[cfg(test)]
            cancel_at: std::sync::Mutex::new(None),
        }
    }

    /// Index of promoted rooms
    pub fn rooms(&self) -> Arc<RoomIndex> {
        Arc::clone(&self.rooms)
    }

    pub fn fill_target(&self) -> usize {
        self.settings.fill_target
    }

    /// Seat `client` in the pending room, promoting the room if it fills
    pub async fn find_opponent(&self, client: &Arc<Client>) -> Result<SearchOutcome> {
        let timer = self.metrics.start_timer();
        let attempt = client.begin_search();

        self.update_stats(|stats| stats.searches_started += 1)?;
        self.metrics.record_search_started();

        debug!(
            "Client {} searching (attempt {})",
            client.id(),
            attempt.sequence()
        );

        let outcome = self.fill(client, &attempt).await;
        client.finish_search(&attempt);

        let outcome = outcome?;
        self.metrics.record_search_outcome(outcome.label(), timer.stop());
        Ok(outcome)
    }

    async fn fill(&self, client: &Arc<Client>, attempt: &SearchAttempt) -> Result<SearchOutcome> {
        if client.current_room().is_some() {
            debug!("Client {} already in a room, ignoring search", client.id());
            return Ok(SearchOutcome::AlreadyInRoom);
        }

        let wait = Instant::now();
        let mut pending = match tokio::time::timeout(
            self.settings.fill_lock_timeout(),
            self.pending.lock(),
        )
        .await
        {
            Ok(guard) => guard,
            Err(_) => {
                warn!(
                    "Fill lock not acquired within {:?}, dropping search of client {}",
                    self.settings.fill_lock_timeout(),
                    client.id()
                );
                self.update_stats(|stats| stats.lock_timeouts += 1)?;
                self.metrics.record_lock_timeout();
                return Ok(SearchOutcome::LockTimeout);
            }
        };
        self.metrics.record_lock_wait(wait.elapsed());

        if self.is_cancelled(attempt, Checkpoint::BeforeRoomLookup) {
            return self.cancelled(client, Checkpoint::BeforeRoomLookup);
        }

        // Membership only changes under the fill lock, so this check is
        // authoritative even if a superseded attempt placed the client.
        if client.current_room().is_some() {
            debug!("Client {} was seated meanwhile, ignoring search", client.id());
            return Ok(SearchOutcome::AlreadyInRoom);
        }

        let room = match pending.as_ref() {
            Some(room) => Arc::clone(room),
            None => {
                let room = Arc::new(Room::new());
                *pending = Some(Arc::clone(&room));
                self.update_stats(|stats| stats.rooms_created += 1)?;
                self.metrics.record_room_created();
                debug!("Created pending room for client {}", client.id());
                room
            }
        };

        if self.is_cancelled(attempt, Checkpoint::BeforeAddMember) {
            self.prune_if_empty(&mut pending, &room)?;
            return self.cancelled(client, Checkpoint::BeforeAddMember);
        }

        if !room.add_member(client)? {
            return Ok(SearchOutcome::AlreadyInRoom);
        }

        if self.is_cancelled(attempt, Checkpoint::BeforeFillCheck) {
            room.leave_member(client);
            self.prune_if_empty(&mut pending, &room)?;
            return self.cancelled(client, Checkpoint::BeforeFillCheck);
        }

        let member_count = room.member_count();
        if member_count < self.settings.fill_target {
            self.record_pending_members(member_count)?;
            info!(
                "Client {} waiting for opponents ({}/{})",
                client.id(),
                member_count,
                self.settings.fill_target
            );
            return Ok(SearchOutcome::Waiting { member_count });
        }

        if self.is_cancelled(attempt, Checkpoint::BeforePromotion) {
            room.leave_member(client);
            self.prune_if_empty(&mut pending, &room)?;
            return self.cancelled(client, Checkpoint::BeforePromotion);
        }

        let room_id = self.rooms.insert_with_fresh_id(Arc::clone(&room))?;
        *pending = None;

        // Once the room is processing no member can leave it, so the startup
        // broadcast runs outside the fill section.
        let members = match room.promote(room_id) {
            Ok(members) => members,
            Err(e) => {
                self.rooms.remove(room_id)?;
                return Err(e);
            }
        };
        self.record_pending_members(0)?;
        drop(pending);

        let delivered = room
            .broadcast_start_room(room_id, &members, &self.bridge)
            .await;

        self.update_stats(|stats| stats.rooms_promoted += 1)?;

        let fill_time = (current_timestamp() - room.created_at())
            .to_std()
            .unwrap_or_default();
        self.metrics.record_room_promoted(
            fill_time,
            delivered,
            member_count.saturating_sub(delivered),
        );

        info!(
            "Room {} promoted with {} members after {:?}",
            room_id, member_count, fill_time
        );

        Ok(SearchOutcome::Promoted {
            room_id,
            member_count,
        })
    }

    /// Withdraw `client` from matchmaking: cancel its search and release it
    /// from the pending room. A room that already started is never left.
    ///
    /// Returns whether the client left a room.
    pub async fn abandon_search(&self, client: &Arc<Client>) -> Result<bool> {
        if client.cancel_search() {
            debug!("Cancelled outstanding search of client {}", client.id());
        }

        let mut pending = self.pending.lock().await;

        let Some(room) = client.current_room() else {
            return Ok(false);
        };

        if room.state() != RoomState::Lobby {
            debug!(
                "Client {} keeps its seat in started room {:?}",
                client.id(),
                room.id()
            );
            return Ok(false);
        }

        if !room.leave_member(client) {
            return Ok(false);
        }

        if !self.prune_if_empty(&mut pending, &room)? {
            self.record_pending_members(room.member_count())?;
        }

        info!("Client {} left the pending room", client.id());
        Ok(true)
    }

    /// Members seated in the pending room
    pub async fn pending_member_count(&self) -> usize {
        self.pending
            .lock()
            .await
            .as_ref()
            .map(|room| room.member_count())
            .unwrap_or(0)
    }

    /// The room currently accepting members
    pub async fn pending_room(&self) -> Option<Arc<Room>> {
        self.pending.lock().await.clone()
    }

    /// Snapshot of matchmaker statistics
    pub fn stats(&self) -> Result<MatchmakerStats> {
        let mut stats = self
            .stats
            .read()
            .map_err(|_| LobbyError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?
            .clone();
        stats.processing_rooms = self.rooms.len();
        Ok(stats)
    }

    /// Leave the stats lock poisoned so bookkeeping fails
    #[cfg(test)]
    pub(crate) fn poison_stats(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _stats = self.stats.write();
            panic!("stats lock poisoned on purpose");
        }));
    }

    fn is_cancelled(&self, attempt: &SearchAttempt, checkpoint: Checkpoint) -> bool {
        #[cfg(test)]
        {
            let cancel_at = self
                .cancel_at
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if *cancel_at == Some(checkpoint) {
                attempt.cancel();
            }
        }

        let cancelled = attempt.is_cancelled();
        if cancelled {
            debug!(
                "Search of client {} cancelled at {}",
                attempt.client_id(),
                checkpoint
            );
        }
        cancelled
    }

    fn cancelled(&self, client: &Client, checkpoint: Checkpoint) -> Result<SearchOutcome> {
        self.update_stats(|stats| stats.searches_cancelled += 1)?;
        self.metrics.record_search_cancelled(checkpoint.label());

        info!(
            "Search of client {} abandoned at {}",
            client.id(),
            checkpoint
        );
        Ok(SearchOutcome::Cancelled { checkpoint })
    }

    /// Drop `room` from the pending slot if it is the pending room and empty
    fn prune_if_empty(&self, pending: &mut Option<Arc<Room>>, room: &Arc<Room>) -> Result<bool> {
        let is_pending = pending
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, room));

        if !is_pending || !room.is_empty() {
            return Ok(false);
        }

        *pending = None;
        self.update_stats(|stats| {
            stats.rooms_abandoned += 1;
            stats.pending_members = 0;
        })?;
        self.metrics.record_room_abandoned();
        self.metrics.set_pending_members(0);

        debug!("Dropped empty pending room");
        Ok(true)
    }

    fn record_pending_members(&self, members: usize) -> Result<()> {
        self.update_stats(|stats| stats.pending_members = members)?;
        self.metrics.set_pending_members(members);
        Ok(())
    }

    fn update_stats(&self, update: impl FnOnce(&mut MatchmakerStats)) -> Result<()> {
        let mut stats = self
            .stats
            .write()
            .map_err(|_| LobbyError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            })?;
        update(&mut stats);
        Ok(())
    }
}
