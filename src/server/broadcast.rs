// ABOUTME: Broadcast fan-out to listener connections
// ABOUTME: Per-recipient failure isolation with pruning of dead connections

use crate::protocol::ServerMessage;
use crate::server::registry::{OutboundFrame, SharedRegistry};

/// Outcome of a fan-out pass over the listener set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Listeners that accepted the frame
    pub delivered: usize,
    /// Listeners whose transport was dead and were removed from the registry
    pub pruned: usize,
}

/// Delivers frames to every open listener, isolating per-recipient failures
///
/// A failed send never aborts the pass: the dead connection is pruned from
/// the registry and delivery continues to the remaining listeners. The
/// operation as a whole cannot fail.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: SharedRegistry,
}

impl Broadcaster {
    /// Create a broadcaster over the given registry
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    /// Serialize a control message once and fan it out to all listeners
    pub fn control(&self, msg: &ServerMessage) -> DeliveryReport {
        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize broadcast message: {}", e);
                return DeliveryReport::default();
            }
        };
        self.fan_out(|| OutboundFrame::Text(json.clone()))
    }

    /// Fan a raw binary payload out to all listeners, bytes unmodified
    pub fn payload(&self, data: &[u8]) -> DeliveryReport {
        self.fan_out(|| OutboundFrame::Binary(data.to_vec()))
    }

    fn fan_out<F>(&self, mut frame: F) -> DeliveryReport
    where
        F: FnMut() -> OutboundFrame,
    {
        // Snapshot the listener set so sending never holds the registry lock
        let listeners = self.registry.listeners();
        let mut report = DeliveryReport::default();
        let mut dead = Vec::new();

        for (id, tx) in listeners {
            if tx.send(frame()).is_ok() {
                report.delivered += 1;
            } else {
                log::warn!("Listener {} unreachable, pruning", id);
                dead.push(id);
                report.pruned += 1;
            }
        }

        self.registry.remove_all(&dead);
        report
    }
}
