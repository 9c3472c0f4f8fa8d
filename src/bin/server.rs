// ABOUTME: Relaycast server binary
// ABOUTME: Standalone relay for streaming one audio source to many listeners

use clap::Parser;
use relaycast::server::{RelayServer, ServerArgs};

#[derive(Parser, Debug)]
#[command(name = "relaycast-server")]
#[command(author, version, about = "Relaycast streaming audio relay", long_about = None)]
struct Args {
    #[command(flatten)]
    server: ServerArgs,
}

#[tokio::main]
async fn main() -> relaycast::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    args.server.init_tracing();

    // Log startup info
    args.server.log_startup_info();

    // Create and run server
    let config = args.server.build_config();
    let server = RelayServer::with_config(config);
    let registry = server.registry();

    // Spawn a task to periodically report connected clients
    let report_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(5));
        loop {
            interval.tick().await;
            let snapshot = registry.snapshot();
            if snapshot.total_clients > 0 {
                tracing::info!("Connected clients: {}", snapshot.total_clients);
                for client in &snapshot.clients {
                    tracing::info!(
                        "  - {} ({}): connected={}",
                        client.id,
                        client.role,
                        client.connected
                    );
                }
            }
        }
    });

    tracing::info!("Press Ctrl+C to stop");

    let result = server.run().await;
    report_task.abort();
    result
}
