// ABOUTME: Shared CLI argument parsing and server builder utilities
// ABOUTME: Keeps binary startup code in one place

use crate::server::ServerConfig;
use clap::Args;
use std::net::SocketAddr;

/// Common server arguments
///
/// Use with `#[command(flatten)]` in your binary's Args struct:
/// ```ignore
/// #[derive(Parser)]
/// struct MyArgs {
///     #[command(flatten)]
///     server: ServerArgs,
/// }
/// ```
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Server name, echoed in the welcome message
    #[arg(short, long, default_value = "audio streaming server")]
    pub name: String,

    /// WebSocket endpoint path
    #[arg(long, default_value = "/ws")]
    pub path: String,

    /// Minimum interval between forwarded audio frames in milliseconds
    #[arg(long, default_value = "10")]
    pub min_interval_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerArgs {
    /// Initialize tracing based on verbosity flag
    pub fn init_tracing(&self) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let filter = if self.verbose {
            "relaycast=debug,tower_http=debug"
        } else {
            "relaycast=info"
        };

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| filter.into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Log startup information
    pub fn log_startup_info(&self) {
        tracing::info!("Relaycast Server v{}", env!("CARGO_PKG_VERSION"));
        tracing::info!("Bind: {}", self.bind);
        tracing::info!("Endpoint: ws://{}{}", self.bind, self.path);
        tracing::info!("Health check: http://{}/health", self.bind);
        tracing::info!("Stats: http://{}/stats", self.bind);
    }

    /// Build ServerConfig from these args
    pub fn build_config(&self) -> ServerConfig {
        ServerConfig::new(&self.name)
            .bind_addr(self.bind)
            .ws_path(self.path.clone())
            .min_frame_interval_ms(self.min_interval_ms)
    }
}
