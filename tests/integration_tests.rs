//! Integration tests for the pvp-lobby service
//!
//! These tests drive the lobby the way the connection transport and the
//! bridge server do:
//! - Room lifecycle from search to finish
//! - Session validation by the bridge
//! - Cancellation and disconnect handling
//! - Concurrent search under load

mod fixtures;
mod integration;
mod load;
