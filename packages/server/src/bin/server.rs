//! LAN chat server.
//!
//! Accepts TCP connections and relays chat envelopes between logged-in users.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lanchat-server
//! cargo run --bin lanchat-server -- --host 127.0.0.1 --port 1500
//! ```

use clap::Parser;
use lanchat_server::{ChatServer, ui::shutdown_signal};
use lanchat_shared::{ConnectionInfo, DEFAULT_PORT, logger::setup_logger};

#[derive(Parser, Debug)]
#[command(name = "lanchat-server")]
#[command(about = "LAN chat server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();
    let info = ConnectionInfo::server(args.host, args.port);

    let server = match ChatServer::bind(&info).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    };

    let handle = server.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        handle.stop();
    });
    tracing::info!("Press Ctrl+C to shutdown gracefully");

    server.run().await;
}
