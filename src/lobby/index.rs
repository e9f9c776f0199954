//! Index of promoted rooms, keyed by room id

use crate::error::{LobbyError, Result};
use crate::lobby::room::Room;
use crate::types::RoomId;
use crate::utils::generate_room_id;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Rooms that have been handed off to the bridge and not yet finished
#[derive(Debug, Default)]
pub struct RoomIndex {
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
}

impl RoomIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `room` under a freshly generated id, regenerating on collision
    pub fn insert_with_fresh_id(&self, room: Arc<Room>) -> Result<RoomId> {
        let mut rooms = self.rooms.write().map_err(|_| LobbyError::InternalError {
            message: "Failed to acquire room index lock".to_string(),
        })?;

        loop {
            let room_id = generate_room_id();
            match rooms.entry(room_id) {
                Entry::Vacant(entry) => {
                    entry.insert(room);
                    return Ok(room_id);
                }
                Entry::Occupied(_) => {
                    warn!("Room id collision on {}, regenerating", room_id);
                }
            }
        }
    }

    pub fn get(&self, room_id: RoomId) -> Result<Option<Arc<Room>>> {
        let rooms = self.rooms.read().map_err(|_| LobbyError::InternalError {
            message: "Failed to acquire room index lock".to_string(),
        })?;

        Ok(rooms.get(&room_id).cloned())
    }

    pub fn remove(&self, room_id: RoomId) -> Result<Option<Arc<Room>>> {
        let mut rooms = self.rooms.write().map_err(|_| LobbyError::InternalError {
            message: "Failed to acquire room index lock".to_string(),
        })?;

        Ok(rooms.remove(&room_id))
    }

    pub fn len(&self) -> usize {
        self.rooms.read().map(|rooms| rooms.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let index = RoomIndex::new();
        let room = Arc::new(Room::new());

        let room_id = index.insert_with_fresh_id(Arc::clone(&room)).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index
            .get(room_id)
            .unwrap()
            .is_some_and(|found| Arc::ptr_eq(&found, &room)));

        assert!(index.remove(room_id).unwrap().is_some());
        assert!(index.remove(room_id).unwrap().is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_fresh_ids_are_distinct() {
        let index = RoomIndex::new();
        let first = index.insert_with_fresh_id(Arc::new(Room::new())).unwrap();
        let second = index.insert_with_fresh_id(Arc::new(Room::new())).unwrap();

        assert_ne!(first, second);
        assert_eq!(index.len(), 2);
    }
}
