// ABOUTME: Server module for the relaycast relay
// ABOUTME: WebSocket server, connection registry, role arbitration, and fan-out

mod arbiter;
mod broadcast;
mod cli;
mod clock;
mod config;
mod rate_limit;
mod registry;
mod server;
mod session;

pub use arbiter::SourceArbiter;
pub use broadcast::{Broadcaster, DeliveryReport};
pub use cli::ServerArgs;
pub use clock::RelayClock;
pub use config::ServerConfig;
pub use rate_limit::{RateLimiter, DEFAULT_MIN_FRAME_INTERVAL_MS};
pub use registry::{
    ClientInfo, ClientRecord, Connection, ConnectionId, ConnectionRegistry, OutboundFrame,
    RegistrySnapshot, SharedRegistry,
};
pub use server::{AppState, RelayServer};
pub use session::handle_connection;
