// ABOUTME: Role arbiter for the single source slot
// ABOUTME: Last-write-wins promotion, demotion on disconnect

use crate::server::registry::ConnectionId;
use parking_lot::RwLock;

/// Maintains the single current source connection
///
/// A newly registering source silently replaces any existing one; the
/// displaced connection is not notified of its demotion.
#[derive(Debug, Default)]
pub struct SourceArbiter {
    current: RwLock<Option<ConnectionId>>,
}

impl SourceArbiter {
    /// Create an arbiter with no current source
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current source unconditionally (last-write-wins)
    pub fn promote(&self, id: ConnectionId) {
        let previous = self.current.write().replace(id);
        match previous {
            Some(old) if old != id => {
                log::info!("Source {} replaced by {}", old, id);
            }
            _ => log::info!("Source promoted: {}", id),
        }
    }

    /// Clear the slot if `id` holds it; returns whether anything changed
    pub fn demote(&self, id: ConnectionId) -> bool {
        let mut current = self.current.write();
        if *current == Some(id) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// The current source connection, if any
    pub fn current(&self) -> Option<ConnectionId> {
        *self.current.read()
    }

    /// Whether `id` is the current source
    pub fn is_source(&self, id: ConnectionId) -> bool {
        *self.current.read() == Some(id)
    }
}
