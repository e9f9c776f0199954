//! pvp-lobby - Lobby and matchmaking service for peer-to-peer sessions
//!
//! This crate pairs connected clients into rooms, promotes each filled room
//! and hands it off to a bridge server that runs the session.

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod lobby;
pub mod metrics;
pub mod network;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LobbyError, Result};
pub use types::*;

// Re-export key components
pub use bridge::{BridgeGateway, BridgeHandler};
pub use client::{Client, ClientRegistry};
pub use lobby::{Matchmaker, Room, SearchOutcome};
pub use network::PacketSender;
pub use service::LobbyService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
