//! cachekv - An In-Memory Key-Value Store
//!
//! This is the main entry point for the cachekv server.
//! It sets up logging, the TCP listener and the storage engine, and
//! hands every accepted connection to its own task.

use cachekv::commands::CommandHandler;
use cachekv::connection::{handle_connection, ConnectionStats};
use cachekv::protocol::parser::DEFAULT_MAX_LINE;
use cachekv::protocol::LineParser;
use cachekv::storage::StorageEngine;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cachekv", version, about = "cachekv - in-memory key-value store")]
struct Args {
    /// Address to listen on; a leading ':' listens on all interfaces
    #[arg(short, long, default_value = cachekv::DEFAULT_ADDR)]
    addr: String,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Longest accepted command line, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_LINE)]
    max_line: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.as_str().into()),
        )
        .with_target(false)
        .init();

    let addr = cachekv::bind_address(&args.addr);

    // Created inside the runtime so expiry timers can always be scheduled
    let storage = Arc::new(StorageEngine::new());
    // One handler for the whole server, so INFO uptime counts from startup
    let handler = CommandHandler::new(storage);
    let stats = Arc::new(ConnectionStats::new());
    let parser = LineParser::with_max_line(args.max_line);

    let listener = TcpListener::bind(&addr).await?;
    info!(version = cachekv::VERSION, "cachekv listening on {addr}");

    // Set up graceful shutdown
    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => error!("Failed to listen for Ctrl+C: {e}"),
        }
    };

    tokio::select! {
        _ = accept_loop(listener, handler, parser, stats) => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    handler: CommandHandler,
    parser: LineParser,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let stats = Arc::clone(&stats);

                tokio::spawn(handle_connection(stream, addr, handler.clone(), parser.clone(), stats));
            }
            Err(e) => {
                error!("Failed to accept connection: {e}");
            }
        }
    }
}
