// Keybridge — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: serve, call, keyrings, policy.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::execute;

/// Keybridge — Routes hardware keyring calls from a suspendable background
/// to a persistent foreground.
#[derive(Parser, Debug)]
#[command(name = "keybridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the foreground: host emulated hardware keyrings on a Unix socket.
    Serve {
        /// Socket path (defaults to $KEYBRIDGE_SOCKET or the runtime dir).
        #[arg(long)]
        socket: Option<PathBuf>,
    },

    /// Call a keyring method from the background side.
    Call {
        /// Keyring type (e.g. "ledger", "trezor", "Lattice Hardware").
        #[arg(long)]
        keyring: String,

        /// Method name (e.g. "getFirstPage").
        #[arg(long)]
        method: String,

        /// Arguments as a JSON array.
        #[arg(long, default_value = "[]")]
        args: String,

        /// Driver state to start from, as JSON.
        #[arg(long)]
        state: Option<String>,

        /// Treat this process as restricted regardless of $KEYBRIDGE_EPHEMERAL.
        #[arg(long, default_value = "false")]
        ephemeral: bool,

        #[arg(long)]
        socket: Option<PathBuf>,
    },

    /// List the keyring types a running foreground hosts.
    Keyrings {
        #[arg(long)]
        socket: Option<PathBuf>,
    },

    /// Show the bridging policy for a keyring type or one of its methods.
    Policy {
        #[arg(long)]
        keyring: String,

        #[arg(long)]
        method: Option<String>,
    },
}
