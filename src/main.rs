// Keybridge — Application Entry Point
//
// Parses CLI arguments, initializes structured logging, and dispatches to
// the command handler. Uses the tokio runtime for the socket server and
// the background transport.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use keybridge::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // RUST_LOG=keybridge=debug for dispatch decisions.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("keybridge=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
