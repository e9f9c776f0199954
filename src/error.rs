//! Error types for the lobby service
//!
//! Domain errors are `thiserror` variants; everything is carried through
//! `anyhow` so callers can attach context with `?`.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific lobby scenarios
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("Invalid session identity format: '{identity}'")]
    InvalidSessionIdentity { identity: String },

    #[error("Room not found: {room_id}")]
    RoomNotFound { room_id: String },

    #[error("Room {room} is not accepting members (state: {state})")]
    RoomNotAccepting { room: String, state: String },

    #[error("Client not found: {client_id}")]
    ClientNotFound { client_id: String },

    #[error("Client disconnected: {client_id}")]
    ClientDisconnected { client_id: String },

    #[error("Invalid packet: {reason}")]
    InvalidPacket { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
