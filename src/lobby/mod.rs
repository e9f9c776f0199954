//! Room lifecycle and matchmaking
//!
//! Clients are seated in a single pending [`Room`] by the [`Matchmaker`].
//! Once the room reaches the fill target it is promoted to `Processing`,
//! recorded in the [`RoomIndex`] and handed off to the bridge.

pub mod index;
pub mod matchmaker;
pub mod room;

// Re-export commonly used types
pub use index::RoomIndex;
pub use matchmaker::{Checkpoint, Matchmaker, MatchmakerStats, SearchOutcome};
pub use room::{Room, RoomMember};
