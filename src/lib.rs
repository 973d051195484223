// Keybridge — Library root
//
// Re-exports the keyring, policy, bridge, foreground, gateway and CLI
// modules.

pub mod bridge;
pub mod cli;
pub mod error;
pub mod foreground;
pub mod gateway;
pub mod keyring;
pub mod policy;

pub use error::{BridgeError, Result};
