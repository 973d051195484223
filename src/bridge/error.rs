// Keybridge — Bridge error types

use thiserror::Error;

use crate::keyring::KeyringError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("No foreground context is attached to the bridge")]
    NoForeground,

    #[error("Bridge dropped invocation {0} without an outcome")]
    Disconnected(u64),

    #[error("Foreground rejected the call: {0}")]
    Remote(KeyringError),

    #[error("Bridge I/O error: {0}")]
    Io(String),

    #[error("Bridge protocol error: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Protocol(e.to_string())
    }
}
