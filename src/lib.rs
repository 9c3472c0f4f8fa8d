// ABOUTME: Main library entry point for relaycast
// ABOUTME: Exports the relay server, protocol types, and error types

//! # relaycast
//!
//! Role-based WebSocket relay for real-time audio streaming: one "source"
//! connection streams binary audio frames plus control events, and the server
//! fans them out to every registered "listener" connection.
//!
//! The relay enforces role discipline (exactly one active source,
//! last-write-wins), precedes every forwarded binary frame with an
//! `audio_chunk` metadata notice, throttles the payload hot path to a minimum
//! inter-frame interval, and keeps membership bookkeeping consistent under
//! connect/disconnect churn. Per-listener delivery failures are isolated:
//! a dead listener is pruned without disturbing the rest of the fan-out.
//!
//! ## Example: Running a Server
//!
//! ```no_run
//! use relaycast::server::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::new("My Relay")
//!         .bind_addr("0.0.0.0:8080".parse().unwrap());
//!
//!     RelayServer::with_config(config).run().await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

/// Wire protocol messages and frame classification
pub mod protocol;
/// Server implementation: registry, arbiter, rate limiter, fan-out, sessions
pub mod server;

pub use protocol::{ClientMessage, Role, ServerMessage};
pub use server::{RelayServer, ServerConfig};

/// Result type for relaycast operations
pub type Result<T> = std::result::Result<T, error::Error>;

/// Error types for relaycast
pub mod error {
    use thiserror::Error;

    /// Error types for relaycast operations
    ///
    /// Per-connection failures never surface here; they are logged and
    /// absorbed inside the relay. Only server lifecycle failures (binding or
    /// serving the listener) propagate to the caller.
    #[derive(Error, Debug)]
    pub enum Error {
        /// Failure binding or serving the network listener
        #[error("I/O error: {0}")]
        Io(#[from] std::io::Error),
    }
}
