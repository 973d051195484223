// Keybridge — Keyring error types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure raised by a keyring driver.
///
/// `Failure` is a genuine error carrying text that can be inspected;
/// `Thrown` models a driver rejecting with a plain value instead of an
/// error, which is never treated as a capability signal.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum KeyringError {
    #[error("{message}")]
    Failure {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cause: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },

    #[error("Non-error value thrown: {value}")]
    Thrown { value: Value },

    #[error("Unsupported keyring method: {method}")]
    UnsupportedMethod { method: String },

    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArguments { method: String, reason: String },
}

impl KeyringError {
    /// A plain failure with only a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            cause: None,
            stack: None,
        }
    }

    /// Attach a user-supplied cause. Ignored for non-`Failure` variants.
    pub fn with_cause(mut self, text: impl Into<String>) -> Self {
        if let Self::Failure { ref mut cause, .. } = self {
            *cause = Some(text.into());
        }
        self
    }

    /// Attach a stack trace. Ignored for non-`Failure` variants.
    pub fn with_stack(mut self, text: impl Into<String>) -> Self {
        if let Self::Failure { ref mut stack, .. } = self {
            *stack = Some(text.into());
        }
        self
    }

    pub fn unsupported(method: &str) -> Self {
        Self::UnsupportedMethod {
            method: method.to_string(),
        }
    }

    pub fn invalid_args(method: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// Text available for diagnosis, or `None` for thrown plain values.
    ///
    /// A cause takes precedence over the error's own message and stack.
    pub fn diagnostic_text(&self) -> Option<String> {
        match self {
            Self::Failure {
                message,
                cause,
                stack,
            } => Some(match (cause, stack) {
                (Some(cause), _) => cause.clone(),
                (None, Some(stack)) => format!("{}\n{}", message, stack),
                (None, None) => message.clone(),
            }),
            Self::Thrown { .. } => None,
            other => Some(other.to_string()),
        }
    }
}
