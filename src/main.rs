//! Payout server.
//!
//! ```text
//!   client ──▶ net::listener ──▶ http::server ──▶ http::driver (one task per connection)
//!                                                     │
//!                      ReadHeader → ReadBody → Handle → WriteResponse ─┐
//!                          ▲                     │                     │
//!                          │                     ▼                     │
//!                          │              payouts::PayoutHandler       │
//!                          │                     │                     │
//!                          │              payouts::PayoutStore         │
//!                          └──────────── keep-alive ◀──────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use payout_server::config::loader::{resolve_config, ConfigOverrides};
use payout_server::lifecycle::{signals, Shutdown};
use payout_server::net::listener::Listener;
use payout_server::observability::{logging, metrics};
use payout_server::payouts::{InMemoryStore, PayoutHandler};
use payout_server::HttpServer;

#[derive(Parser)]
#[command(name = "payout-server")]
#[command(about = "Length-framed HTTP/1.1 server answering payout queries", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        bind_address: cli.bind,
    };
    let config = resolve_config(cli.config.as_deref(), overrides)?;

    logging::init_tracing(&config.observability)?;

    tracing::info!("payout-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        read_timeout_secs = config.timeouts.read_secs,
        payouts = config.store.payouts.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let listener = Listener::bind(&config.listener).await?;

    let store = Arc::new(InMemoryStore::from_entries(&config.store.payouts));
    let server = HttpServer::new(&config, PayoutHandler::new(store));

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    signals::shutdown_on_signal(&shutdown).await;
    server_task.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
