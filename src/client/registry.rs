//! Registry of connected clients

use crate::client::Client;
use crate::error::{LobbyError, Result};
use crate::network::PacketSender;
use crate::types::ClientId;
use crate::utils::generate_client_id;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Tracks connected clients by their server-assigned identity
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, Arc<Client>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection under a fresh identity
    pub fn register(&self, sender: Arc<dyn PacketSender>) -> Result<Arc<Client>> {
        let mut clients = self
            .clients
            .write()
            .map_err(|_| LobbyError::InternalError {
                message: "Failed to acquire clients lock".to_string(),
            })?;

        loop {
            let client_id = generate_client_id();
            match clients.entry(client_id) {
                Entry::Vacant(entry) => {
                    let client = Arc::new(Client::new(client_id, Arc::clone(&sender)));
                    entry.insert(Arc::clone(&client));

                    info!(
                        "Client connected - client_id: {}, connected_clients: {}",
                        client_id,
                        clients.len()
                    );
                    return Ok(client);
                }
                Entry::Occupied(_) => {
                    warn!("Client identity collision on {}, regenerating", client_id);
                }
            }
        }
    }

    /// Remove a client; unknown identities are ignored
    pub fn unregister(&self, client_id: ClientId) -> Result<Option<Arc<Client>>> {
        let removed = self
            .clients
            .write()
            .map_err(|_| LobbyError::InternalError {
                message: "Failed to acquire clients lock".to_string(),
            })?
            .remove(&client_id);

        match &removed {
            Some(_) => info!("Client disconnected - client_id: {}", client_id),
            None => debug!("Ignoring unregister of unknown client {}", client_id),
        }

        Ok(removed)
    }

    /// Look up a connected client
    pub fn get(&self, client_id: ClientId) -> Result<Option<Arc<Client>>> {
        let clients = self
            .clients
            .read()
            .map_err(|_| LobbyError::InternalError {
                message: "Failed to acquire clients lock".to_string(),
            })?;

        Ok(clients.get(&client_id).cloned())
    }

    /// Number of connected clients
    pub fn len(&self) -> usize {
        self.clients.read().map(|clients| clients.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
