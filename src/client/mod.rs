//! Connected clients and their search attempts
//!
//! A [`Client`] is created by the [`ClientRegistry`] when the transport
//! reports a new connection. It carries the outbound sender for that
//! connection, a non-owning back-reference to the room it sits in, and the
//! cancellation handle of its outstanding search.

pub mod registry;
pub mod search;

pub use registry::ClientRegistry;
pub use search::SearchAttempt;

use crate::error::Result;
use crate::lobby::room::Room;
use crate::network::PacketSender;
use crate::types::{ClientId, RoomState, ServerPacket};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A connected client
pub struct Client {
    id: ClientId,
    sender: Arc<dyn PacketSender>,
    connected_at: DateTime<Utc>,
    current_room: Mutex<Weak<Room>>,
    search: Mutex<Option<SearchAttempt>>,
    search_sequence: AtomicU64,
}

impl Client {
    pub(crate) fn new(id: ClientId, sender: Arc<dyn PacketSender>) -> Self {
        Self {
            id,
            sender,
            connected_at: current_timestamp(),
            current_room: Mutex::new(Weak::new()),
            search: Mutex::new(None),
            search_sequence: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Deliver a packet through the client's connection
    pub async fn send(&self, packet: ServerPacket) -> Result<()> {
        self.sender.send(packet).await
    }

    /// The room this client currently belongs to, if it is still live
    pub fn current_room(&self) -> Option<Arc<Room>> {
        // Rooms lock before clients, so the guard is released before the room
        // is inspected.
        let room = lock(&self.current_room).upgrade()?;
        (room.state() != RoomState::Runned).then_some(room)
    }

    pub(crate) fn set_current_room(&self, room: &Arc<Room>) {
        *lock(&self.current_room) = Arc::downgrade(room);
    }

    /// Clear the back-reference if it still points at `room`
    pub(crate) fn clear_current_room(&self, room: &Room) {
        let mut current = lock(&self.current_room);
        if std::ptr::eq(current.as_ptr(), room) {
            *current = Weak::new();
        }
    }

    /// Cancel any outstanding attempt and install a fresh one
    pub fn begin_search(&self) -> SearchAttempt {
        let sequence = self.search_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let attempt = SearchAttempt::new(self.id, sequence);

        let previous = lock(&self.search).replace(attempt.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        attempt
    }

    /// Cancel and clear the outstanding attempt; returns whether one existed
    pub fn cancel_search(&self) -> bool {
        match lock(&self.search).take() {
            Some(attempt) => {
                attempt.cancel();
                true
            }
            None => false,
        }
    }

    /// Clear `attempt` once it has run to completion, unless it was superseded
    pub fn finish_search(&self, attempt: &SearchAttempt) {
        let mut search = lock(&self.search);
        if search
            .as_ref()
            .is_some_and(|current| current.is_same_attempt(attempt))
        {
            *search = None;
        }
    }

    /// The outstanding attempt, if any
    pub fn active_search(&self) -> Option<SearchAttempt> {
        lock(&self.search).clone()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::RecordingPacketSender;
    use crate::utils::generate_client_id;

    fn create_test_client() -> Client {
        Client::new(generate_client_id(), Arc::new(RecordingPacketSender::new()))
    }

    #[test]
    fn test_new_search_supersedes_previous() {
        let client = create_test_client();

        let first = client.begin_search();
        let second = client.begin_search();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(second.sequence() > first.sequence());
        assert!(client
            .active_search()
            .is_some_and(|active| active.is_same_attempt(&second)));
    }

    #[test]
    fn test_cancel_search_is_idempotent() {
        let client = create_test_client();
        let attempt = client.begin_search();

        assert!(client.cancel_search());
        assert!(attempt.is_cancelled());
        assert!(client.active_search().is_none());

        assert!(!client.cancel_search());
    }

    #[test]
    fn test_finish_search_keeps_newer_attempt() {
        let client = create_test_client();
        let first = client.begin_search();
        let second = client.begin_search();

        client.finish_search(&first);
        assert!(client.active_search().is_some());

        client.finish_search(&second);
        assert!(client.active_search().is_none());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_back_reference_does_not_own_room() {
        let client = create_test_client();
        let room = Arc::new(Room::new());

        client.set_current_room(&room);
        assert!(client.current_room().is_some());

        drop(room);
        assert!(client.current_room().is_none());
    }

    #[test]
    fn test_clear_current_room_only_for_same_room() {
        let client = create_test_client();
        let room = Arc::new(Room::new());
        let other = Room::new();

        client.set_current_room(&room);
        client.clear_current_room(&other);
        assert!(client.current_room().is_some());

        client.clear_current_room(&room);
        assert!(client.current_room().is_none());
    }
}
