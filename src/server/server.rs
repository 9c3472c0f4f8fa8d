// ABOUTME: Main relay server implementation
// ABOUTME: WebSocket endpoint plus live health/stats reporting over one axum router

use crate::server::arbiter::SourceArbiter;
use crate::server::clock::RelayClock;
use crate::server::config::ServerConfig;
use crate::server::rate_limit::RateLimiter;
use crate::server::registry::{ClientRecord, ConnectionRegistry, SharedRegistry};
use crate::server::session::handle_connection;
use axum::{
    extract::ws::WebSocketUpgrade,
    extract::State,
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Connection registry
    pub registry: SharedRegistry,
    /// Source arbiter
    pub arbiter: Arc<SourceArbiter>,
    /// Payload rate limiter
    pub rate_limiter: Arc<RateLimiter>,
    /// Server clock
    pub clock: Arc<RelayClock>,
}

/// Relaycast server
pub struct RelayServer {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Connection registry
    registry: SharedRegistry,
    /// Source arbiter
    arbiter: Arc<SourceArbiter>,
    /// Payload rate limiter
    rate_limiter: Arc<RateLimiter>,
    /// Server clock
    clock: Arc<RelayClock>,
}

impl RelayServer {
    /// Create a new relay server with default configuration
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new relay server with custom configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let rate_limiter = RateLimiter::new(Duration::from_millis(config.min_frame_interval_ms));
        Self {
            config: Arc::new(config),
            registry: Arc::new(ConnectionRegistry::new()),
            arbiter: Arc::new(SourceArbiter::new()),
            rate_limiter: Arc::new(rate_limiter),
            clock: Arc::new(RelayClock::new()),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the connection registry
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Build the axum application serving the relay and its query endpoints
    pub fn app(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            registry: self.registry.clone(),
            arbiter: self.arbiter.clone(),
            rate_limiter: self.rate_limiter.clone(),
            clock: self.clock.clone(),
        };

        Router::new()
            .route(&self.config.ws_path, any(ws_handler))
            .route("/health", get(health_handler))
            .route("/stats", get(stats_handler))
            .with_state(state)
    }

    /// Run the server until Ctrl-C
    pub async fn run(self) -> crate::Result<()> {
        let config = self.config.clone();
        let app = self.app();

        let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
        log::info!(
            "Relaycast server listening on {} (endpoint: {})",
            config.bind_addr,
            config.ws_path
        );

        let shutdown_signal = async {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Received shutdown signal");
            }
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        log::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for RelayServer {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        handle_connection(
            socket,
            state.registry,
            state.arbiter,
            state.rate_limiter,
            state.clock,
            state.config,
        )
    })
}

/// Health check response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    connected_clients: usize,
    master_connected: bool,
    uptime: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        connected_clients: state.registry.client_count(),
        master_connected: state.arbiter.current().is_some(),
        uptime: state.clock.uptime_secs(),
    })
}

/// Stats response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    total_clients: usize,
    master_connected: bool,
    clients: Vec<ClientRecord>,
    uptime: u64,
}

async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    // Computed live from the registry at request time, never cached
    let snapshot = state.registry.snapshot();
    Json(StatsResponse {
        total_clients: snapshot.total_clients,
        master_connected: state.arbiter.current().is_some(),
        clients: snapshot.clients,
        uptime: state.clock.uptime_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Role;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn state_for(server: &RelayServer) -> AppState {
        AppState {
            config: server.config.clone(),
            registry: server.registry.clone(),
            arbiter: server.arbiter.clone(),
            rate_limiter: server.rate_limiter.clone(),
            clock: server.clock.clone(),
        }
    }

    #[tokio::test]
    async fn test_health_reflects_membership() {
        let server = RelayServer::new();
        let state = state_for(&server);

        let health = health_handler(State(state.clone())).await.0;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.connected_clients, 0);
        assert!(!health.master_connected);

        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        server.registry.on_connect(id, tx);
        server.registry.register(id, Role::Source, "s1".to_string(), 0);
        server.arbiter.promote(id);

        let health = health_handler(State(state)).await.0;
        assert_eq!(health.connected_clients, 1);
        assert!(health.master_connected);
    }

    #[tokio::test]
    async fn test_stats_lists_registered_clients() {
        let server = RelayServer::new();
        let state = state_for(&server);

        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        server.registry.on_connect(id, tx);
        server.registry.register(id, Role::Listener, "l1".to_string(), 99);

        let stats = stats_handler(State(state)).await.0;
        assert_eq!(stats.total_clients, 1);
        assert!(!stats.master_connected);
        assert_eq!(stats.clients.len(), 1);
        assert_eq!(stats.clients[0].id, "l1");
        assert_eq!(stats.clients[0].role, "listener");
        assert_eq!(stats.clients[0].connected_at, 99);
        assert!(stats.clients[0].connected);
    }
}
