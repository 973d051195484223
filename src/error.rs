// Keybridge — Top-level error types
//
// Aggregates keyring, policy and transport failures into a single error
// enum for callers of the bridge and the CLI.

use thiserror::Error;

/// Top-level error type for all Keybridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] crate::keyring::KeyringError),

    #[error("Policy error: {0}")]
    Policy(#[from] crate::policy::PolicyError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::bridge::TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
