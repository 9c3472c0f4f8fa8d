// ABOUTME: Server configuration
// ABOUTME: Defines configurable parameters for the relay server

use crate::server::rate_limit::DEFAULT_MIN_FRAME_INTERVAL_MS;
use std::net::SocketAddr;

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// WebSocket endpoint path
    pub ws_path: String,
    /// Server name, echoed in the welcome message
    pub name: String,
    /// Minimum interval between forwarded payload frames in milliseconds
    pub min_frame_interval_ms: u64,
}

impl ServerConfig {
    /// Create a new server configuration with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the WebSocket path
    pub fn ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    /// Set the minimum payload inter-frame interval in milliseconds
    pub fn min_frame_interval_ms(mut self, ms: u64) -> Self {
        self.min_frame_interval_ms = ms;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            ws_path: "/ws".to_string(),
            name: "audio streaming server".to_string(),
            min_frame_interval_ms: DEFAULT_MIN_FRAME_INTERVAL_MS,
        }
    }
}
