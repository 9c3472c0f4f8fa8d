// ABOUTME: Connection registry
// ABOUTME: Thread-safe map of live connections, their roles, and membership snapshots

use crate::protocol::Role;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique connection identifier, assigned by the relay on accept
pub type ConnectionId = Uuid;

/// Frame types that can be queued for delivery to a connection
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// JSON text message
    Text(String),
    /// Raw binary audio payload, forwarded byte-for-byte
    Binary(Vec<u8>),
}

/// Registration details for a connection that has sent `register`
#[derive(Debug, Clone)]
pub struct ClientInfo {
    /// Registered role
    pub role: Role,
    /// Client-chosen external identifier
    pub external_id: String,
    /// Wall-clock registration time in milliseconds
    pub registered_at: i64,
}

/// A tracked connection
///
/// Connections are tracked from accept; `info` stays `None` until the client
/// sends `register`. Unregistered connections count toward membership totals
/// but are never promoted and never receive broadcasts.
#[derive(Debug)]
pub struct Connection {
    /// Channel draining into this connection's WebSocket sink
    pub tx: mpsc::UnboundedSender<OutboundFrame>,
    /// Registration details, if the client has registered
    pub info: Option<ClientInfo>,
}

impl Connection {
    /// Whether the transport side of this connection is still accepting frames
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Whether this connection is a registered, open listener
    pub fn is_listener(&self) -> bool {
        self.is_open()
            && self
                .info
                .as_ref()
                .is_some_and(|info| info.role == Role::Listener)
    }
}

/// One entry in a membership snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    /// Registered role string
    pub role: &'static str,
    /// Client-chosen external identifier
    pub id: String,
    /// Wall-clock registration time in milliseconds
    pub connected_at: i64,
    /// Whether the connection was open at snapshot time
    pub connected: bool,
}

/// Live membership snapshot for health/stats collaborators
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    /// All tracked connections, registered or not
    pub total_clients: usize,
    /// One record per registered connection
    pub clients: Vec<ClientRecord>,
}

/// Tracks every live connection and its registered role
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly accepted connection, initially unregistered
    pub fn on_connect(&self, id: ConnectionId, tx: mpsc::UnboundedSender<OutboundFrame>) {
        self.connections
            .write()
            .insert(id, Connection { tx, info: None });
        log::info!("Connection {} tracked, total: {}", id, self.client_count());
    }

    /// Create or replace the registration for a connection
    ///
    /// Re-registering replaces the prior info; it never duplicates the entry.
    /// Registering an untracked connection is a no-op.
    pub fn register(&self, id: ConnectionId, role: Role, external_id: String, now_ms: i64) {
        if let Some(conn) = self.connections.write().get_mut(&id) {
            conn.info = Some(ClientInfo {
                role,
                external_id,
                registered_at: now_ms,
            });
        }
    }

    /// Stop tracking a connection, returning its registration if it had one
    pub fn on_disconnect(&self, id: ConnectionId) -> Option<ClientInfo> {
        let conn = self.connections.write().remove(&id);
        if conn.is_some() {
            log::info!("Connection {} removed, total: {}", id, self.client_count());
        }
        conn.and_then(|c| c.info)
    }

    /// Number of tracked connections, including unregistered ones
    pub fn client_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Registration details for a connection
    pub fn client_info(&self, id: ConnectionId) -> Option<ClientInfo> {
        self.connections.read().get(&id)?.info.clone()
    }

    /// Queue a frame for one specific connection
    pub fn send_to(&self, id: ConnectionId, frame: OutboundFrame) -> bool {
        if let Some(conn) = self.connections.read().get(&id) {
            conn.tx.send(frame).is_ok()
        } else {
            false
        }
    }

    /// Open listener connections with clones of their outbound senders
    ///
    /// Used by the fan-out to send without holding the registry lock.
    pub fn listeners(&self) -> Vec<(ConnectionId, mpsc::UnboundedSender<OutboundFrame>)> {
        self.connections
            .read()
            .iter()
            .filter(|(_, conn)| conn.is_listener())
            .map(|(id, conn)| (*id, conn.tx.clone()))
            .collect()
    }

    /// Remove several connections at once (used when fan-out prunes dead peers)
    pub fn remove_all(&self, ids: &[ConnectionId]) {
        if ids.is_empty() {
            return;
        }
        let mut connections = self.connections.write();
        for id in ids {
            connections.remove(id);
        }
    }

    /// Membership snapshot computed live at call time, never cached
    pub fn snapshot(&self) -> RegistrySnapshot {
        let connections = self.connections.read();
        let clients = connections
            .values()
            .filter_map(|conn| {
                conn.info.as_ref().map(|info| ClientRecord {
                    role: info.role.as_str(),
                    id: info.external_id.clone(),
                    connected_at: info.registered_at,
                    connected: conn.is_open(),
                })
            })
            .collect();
        RegistrySnapshot {
            total_clients: connections.len(),
            clients,
        }
    }
}

/// Shared handle to a registry
pub type SharedRegistry = Arc<ConnectionRegistry>;
