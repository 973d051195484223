// Keybridge — Gateway Module
//
// Carries bridged calls between processes: a Unix Domain Socket server on
// the foreground side and a matching transport for the background side,
// speaking newline-delimited JSON-RPC 2.0.

mod client;
mod protocol;
mod uds;

pub use client::UdsTransport;
pub use uds::{default_socket_path, UdsServer, SOCKET_ENV};
