// ABOUTME: Relay session: per-connection message dispatch and lifecycle
// ABOUTME: Classifies inbound frames, drives registry/arbiter/rate-limiter/fan-out

use crate::protocol::{classify, ClientMessage, InboundFrame, Role, ServerMessage};
use crate::server::arbiter::SourceArbiter;
use crate::server::broadcast::Broadcaster;
use crate::server::clock::RelayClock;
use crate::server::config::ServerConfig;
use crate::server::rate_limit::RateLimiter;
use crate::server::registry::{ConnectionId, ConnectionRegistry, OutboundFrame, SharedRegistry};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Per-connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Just opened, no registration yet
    Connected,
    /// Registered with a role
    Registered(Role),
    /// Torn down; no further sends permitted
    Closed,
}

/// Handle one WebSocket connection for its entire lifetime
pub async fn handle_connection(
    socket: WebSocket,
    registry: SharedRegistry,
    arbiter: Arc<SourceArbiter>,
    rate_limiter: Arc<RateLimiter>,
    clock: Arc<RelayClock>,
    config: Arc<ServerConfig>,
) {
    let conn_id: ConnectionId = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let broadcaster = Broadcaster::new(registry.clone());

    log::info!("New client connected: {}", conn_id);

    // Send the welcome message before the connection enters the registry
    let welcome = ServerMessage::Connection {
        message: format!("Connected to {}", config.name),
        timestamp: clock.now_millis(),
    };
    let welcome_json = match serde_json::to_string(&welcome) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize welcome message: {}", e);
            return;
        }
    };
    if ws_tx.send(WsMessage::Text(welcome_json.into())).await.is_err() {
        log::warn!("Connection {} closed before welcome", conn_id);
        return;
    }

    // All outbound frames flow through this channel so broadcasts and direct
    // replies share one FIFO per connection
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();
    registry.on_connect(conn_id, tx);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let ws_msg = match frame {
                OutboundFrame::Text(text) => WsMessage::Text(text.into()),
                OutboundFrame::Binary(data) => WsMessage::Binary(data.into()),
            };
            if ws_tx.send(ws_msg).await.is_err() {
                log::debug!("Connection {} disconnected (send failed)", conn_id);
                break;
            }
        }
    });

    let mut state = SessionState::Connected;

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => dispatch_frame(
                classify(text.as_bytes().to_vec()),
                conn_id,
                &mut state,
                &registry,
                &arbiter,
                &rate_limiter,
                &broadcaster,
                &clock,
            ),
            Ok(WsMessage::Binary(data)) => dispatch_frame(
                classify(data.to_vec()),
                conn_id,
                &mut state,
                &registry,
                &arbiter,
                &rate_limiter,
                &broadcaster,
                &clock,
            ),
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {
                // Handled automatically by axum
            }
            Ok(WsMessage::Close(_)) => {
                log::info!("Connection {} closed by peer", conn_id);
                break;
            }
            Err(e) => {
                // Transport errors alone never end the session; the close
                // sequence ends the stream when the connection is truly gone
                log::warn!("WebSocket error on {}: {}", conn_id, e);
            }
        }
    }

    // Teardown: deregister, demote if this was the source, refresh membership
    let info = registry.on_disconnect(conn_id);
    if arbiter.demote(conn_id) {
        log::info!("Source client disconnected: {}", conn_id);
        broadcaster.control(&ServerMessage::MasterDisconnected {
            timestamp: clock.now_millis(),
        });
    }
    broadcaster.control(&ServerMessage::ClientUpdate {
        total_clients: registry.client_count(),
        timestamp: clock.now_millis(),
    });

    state = SessionState::Closed;
    match info {
        Some(info) => log::info!(
            "Client disconnected: {} ({}), state {:?}",
            info.external_id,
            info.role.as_str(),
            state
        ),
        None => log::info!("Unregistered connection {} closed, state {:?}", conn_id, state),
    }

    send_task.abort();
}

/// Route one classified frame through the relay components
#[allow(clippy::too_many_arguments)]
fn dispatch_frame(
    frame: InboundFrame,
    conn_id: ConnectionId,
    state: &mut SessionState,
    registry: &ConnectionRegistry,
    arbiter: &SourceArbiter,
    rate_limiter: &RateLimiter,
    broadcaster: &Broadcaster,
    clock: &RelayClock,
) {
    match frame {
        InboundFrame::Control(msg) => dispatch_control(
            msg,
            conn_id,
            state,
            registry,
            arbiter,
            broadcaster,
            clock,
        ),
        InboundFrame::Payload(data) => {
            dispatch_payload(&data, conn_id, arbiter, rate_limiter, broadcaster, clock)
        }
    }
}

fn dispatch_control(
    msg: ClientMessage,
    conn_id: ConnectionId,
    state: &mut SessionState,
    registry: &ConnectionRegistry,
    arbiter: &SourceArbiter,
    broadcaster: &Broadcaster,
    clock: &RelayClock,
) {
    match msg {
        ClientMessage::Register { role, id } => {
            let now = clock.now_millis();
            registry.register(conn_id, role, id.clone(), now);

            match role {
                Role::Source => {
                    arbiter.promote(conn_id);
                    log::info!("Source client registered: {}", id);
                }
                Role::Listener => log::info!("Listener client registered: {}", id),
            }

            let total = registry.client_count();
            send_message(
                registry,
                conn_id,
                &ServerMessage::Registered {
                    role,
                    connected_clients: total,
                    timestamp: now,
                },
            );
            broadcaster.control(&ServerMessage::ClientUpdate {
                total_clients: total,
                timestamp: now,
            });

            *state = SessionState::Registered(role);
        }
        ClientMessage::AudioStart => {
            // Relayed regardless of sender role; flagged when it is not the source
            if !arbiter.is_source(conn_id) {
                log::warn!("audio_start from non-source connection {}", conn_id);
            }
            log::info!("Audio stream starting");
            broadcaster.control(&ServerMessage::AudioStart {
                timestamp: clock.now_millis(),
            });
        }
        ClientMessage::AudioStop => {
            if !arbiter.is_source(conn_id) {
                log::warn!("audio_stop from non-source connection {}", conn_id);
            }
            log::info!("Audio stream stopping");
            broadcaster.control(&ServerMessage::AudioStop {
                timestamp: clock.now_millis(),
            });
        }
        ClientMessage::Sync { timestamp } => {
            broadcaster.control(&ServerMessage::Sync {
                master_timestamp: timestamp,
                server_timestamp: clock.now_millis(),
            });
        }
        ClientMessage::Unknown => {
            log::debug!("Unhandled control message from {}", conn_id);
        }
    }
}

fn dispatch_payload(
    data: &[u8],
    conn_id: ConnectionId,
    arbiter: &SourceArbiter,
    rate_limiter: &RateLimiter,
    broadcaster: &Broadcaster,
    clock: &RelayClock,
) {
    if !arbiter.is_source(conn_id) {
        log::debug!(
            "Dropping {}-byte payload from non-source connection {}",
            data.len(),
            conn_id
        );
        return;
    }

    if !rate_limiter.allow(Instant::now()) {
        log::trace!("Rate-limited {}-byte payload from source {}", data.len(), conn_id);
        return;
    }

    log::debug!("Broadcasting audio chunk of size: {}", data.len());

    // Metadata first, then the raw bytes; each listener's FIFO preserves the pair order
    broadcaster.control(&ServerMessage::AudioChunk {
        timestamp: clock.now_millis(),
        size: data.len(),
    });
    broadcaster.payload(data);
}

/// Serialize and queue a message for one specific connection
fn send_message(registry: &ConnectionRegistry, conn_id: ConnectionId, msg: &ServerMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            if !registry.send_to(conn_id, OutboundFrame::Text(json)) {
                log::debug!("Failed to queue message for connection {}", conn_id);
            }
        }
        Err(e) => log::error!("Failed to serialize message: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Harness {
        registry: SharedRegistry,
        arbiter: Arc<SourceArbiter>,
        rate_limiter: Arc<RateLimiter>,
        broadcaster: Broadcaster,
        clock: Arc<RelayClock>,
    }

    impl Harness {
        fn new() -> Self {
            let registry: SharedRegistry = Arc::new(ConnectionRegistry::new());
            Self {
                arbiter: Arc::new(SourceArbiter::new()),
                rate_limiter: Arc::new(RateLimiter::default()),
                broadcaster: Broadcaster::new(registry.clone()),
                clock: Arc::new(RelayClock::new()),
                registry,
            }
        }

        fn connect(&self) -> (ConnectionId, UnboundedReceiver<OutboundFrame>, SessionState) {
            let id = Uuid::new_v4();
            let (tx, rx) = mpsc::unbounded_channel();
            self.registry.on_connect(id, tx);
            (id, rx, SessionState::Connected)
        }

        fn dispatch(&self, frame: InboundFrame, conn_id: ConnectionId, state: &mut SessionState) {
            dispatch_frame(
                frame,
                conn_id,
                state,
                &self.registry,
                &self.arbiter,
                &self.rate_limiter,
                &self.broadcaster,
                &self.clock,
            );
        }

        fn register(&self, conn_id: ConnectionId, state: &mut SessionState, role: Role, id: &str) {
            self.dispatch(
                InboundFrame::Control(ClientMessage::Register {
                    role,
                    id: id.to_string(),
                }),
                conn_id,
                state,
            );
        }
    }

    fn next_text(rx: &mut UnboundedReceiver<OutboundFrame>) -> String {
        match rx.try_recv().expect("expected a queued frame") {
            OutboundFrame::Text(text) => text,
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    fn next_binary(rx: &mut UnboundedReceiver<OutboundFrame>) -> Vec<u8> {
        match rx.try_recv().expect("expected a queued frame") {
            OutboundFrame::Binary(data) => data,
            other => panic!("expected binary frame, got {:?}", other),
        }
    }

    #[test]
    fn test_register_confirms_and_updates_listeners() {
        let harness = Harness::new();
        let (listener, mut rx_l, mut state_l) = harness.connect();
        harness.register(listener, &mut state_l, Role::Listener, "l1");

        let confirm = next_text(&mut rx_l);
        assert!(confirm.contains(r#""type":"registered""#));
        assert!(confirm.contains(r#""connectedClients":1"#));
        // The listener also receives the broadcast membership update
        let update = next_text(&mut rx_l);
        assert!(update.contains(r#""type":"client_update""#));
        assert!(update.contains(r#""totalClients":1"#));
        assert_eq!(state_l, SessionState::Registered(Role::Listener));
    }

    #[test]
    fn test_source_registration_promotes() {
        let harness = Harness::new();
        let (source, _rx, mut state) = harness.connect();
        harness.register(source, &mut state, Role::Source, "s1");

        assert!(harness.arbiter.is_source(source));
        assert_eq!(state, SessionState::Registered(Role::Source));
    }

    #[test]
    fn test_payload_from_non_source_dropped() {
        let harness = Harness::new();
        let (listener, mut rx_l, mut state_l) = harness.connect();
        harness.register(listener, &mut state_l, Role::Listener, "l1");
        let (other, _rx_o, mut state_o) = harness.connect();

        // Drain the registration traffic before sending the payload
        while rx_l.try_recv().is_ok() {}

        harness.dispatch(InboundFrame::Payload(vec![1, 2, 3]), other, &mut state_o);
        assert!(rx_l.try_recv().is_err());
    }

    #[test]
    fn test_payload_from_source_metadata_then_bytes() {
        let harness = Harness::new();
        let (source, _rx_s, mut state_s) = harness.connect();
        harness.register(source, &mut state_s, Role::Source, "s1");
        let (listener, mut rx_l, mut state_l) = harness.connect();
        harness.register(listener, &mut state_l, Role::Listener, "l1");
        while rx_l.try_recv().is_ok() {}

        let payload = vec![7u8; 50];
        harness.dispatch(InboundFrame::Payload(payload.clone()), source, &mut state_s);

        let meta = next_text(&mut rx_l);
        assert!(meta.contains(r#""type":"audio_chunk""#));
        assert!(meta.contains(r#""size":50"#));
        assert_eq!(next_binary(&mut rx_l), payload);
    }

    #[test]
    fn test_second_payload_inside_interval_dropped() {
        let harness = Harness::new();
        let (source, _rx_s, mut state_s) = harness.connect();
        harness.register(source, &mut state_s, Role::Source, "s1");
        let (listener, mut rx_l, mut state_l) = harness.connect();
        harness.register(listener, &mut state_l, Role::Listener, "l1");
        while rx_l.try_recv().is_ok() {}

        // Back-to-back dispatches land well inside the 10ms window
        harness.dispatch(InboundFrame::Payload(vec![1; 8]), source, &mut state_s);
        harness.dispatch(InboundFrame::Payload(vec![2; 8]), source, &mut state_s);

        assert!(next_text(&mut rx_l).contains("audio_chunk"));
        assert_eq!(next_binary(&mut rx_l), vec![1; 8]);
        // No metadata and no payload for the rate-limited frame
        assert!(rx_l.try_recv().is_err());
    }

    #[test]
    fn test_sync_echoes_sender_timestamp() {
        let harness = Harness::new();
        let (source, _rx_s, mut state_s) = harness.connect();
        harness.register(source, &mut state_s, Role::Source, "s1");
        let (listener, mut rx_l, mut state_l) = harness.connect();
        harness.register(listener, &mut state_l, Role::Listener, "l1");
        while rx_l.try_recv().is_ok() {}

        harness.dispatch(
            InboundFrame::Control(ClientMessage::Sync { timestamp: 123_456 }),
            source,
            &mut state_s,
        );

        let sync = next_text(&mut rx_l);
        assert!(sync.contains(r#""masterTimestamp":123456"#));
        assert!(sync.contains(r#""serverTimestamp":"#));
    }

    #[test]
    fn test_reregistering_source_last_write_wins() {
        let harness = Harness::new();
        let (first, _rx_a, mut state_a) = harness.connect();
        let (second, _rx_b, mut state_b) = harness.connect();
        harness.register(first, &mut state_a, Role::Source, "s1");
        harness.register(second, &mut state_b, Role::Source, "s2");

        assert!(harness.arbiter.is_source(second));
        assert!(!harness.arbiter.is_source(first));
    }

    #[test]
    fn test_unknown_control_ignored() {
        let harness = Harness::new();
        let (source, _rx_s, mut state_s) = harness.connect();
        harness.register(source, &mut state_s, Role::Source, "s1");
        let (listener, mut rx_l, mut state_l) = harness.connect();
        harness.register(listener, &mut state_l, Role::Listener, "l1");
        while rx_l.try_recv().is_ok() {}

        // A structured message with an unknown type is skipped, even from the
        // source; it must not be forwarded as audio
        harness.dispatch(
            classify(br#"{"type":"volume","level":5}"#.to_vec()),
            source,
            &mut state_s,
        );
        assert!(rx_l.try_recv().is_err());
    }
}
