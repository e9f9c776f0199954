//! Utility functions for the lobby service

use crate::error::{LobbyError, Result};
use crate::types::{ClientId, RoomId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Separator between fields of a session identity
pub const SESSION_IDENTITY_SEPARATOR: char = ':';

/// Generate a new client identity
pub fn generate_client_id() -> ClientId {
    Uuid::new_v4()
}

/// Generate a new room ID
pub fn generate_room_id() -> RoomId {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Session identity handed to a room member in its startup packet
pub fn session_identity_for(client_id: ClientId) -> String {
    client_id.to_string()
}

/// Extract the client identity from the leading field of a session identity
pub fn parse_session_identity(session_identity: &str) -> Result<ClientId> {
    let leading = session_identity
        .split(SESSION_IDENTITY_SEPARATOR)
        .next()
        .unwrap_or_default()
        .trim();

    Uuid::parse_str(leading).map_err(|_| {
        LobbyError::InvalidSessionIdentity {
            identity: session_identity.to_string(),
        }
        .into()
    })
}
