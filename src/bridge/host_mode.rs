// Keybridge — Host Mode
//
// Whether the current execution context is the restrictive, recyclable
// kind. Implementations must answer from live state on every call.

use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variable consulted by [`EnvHostMode`].
pub const EPHEMERAL_ENV: &str = "KEYBRIDGE_EPHEMERAL";

pub trait HostMode: Send + Sync {
    fn is_restricted(&self) -> bool;
}

/// A flag the embedding runtime flips when its context is recycled.
#[derive(Debug, Default)]
pub struct RestrictedFlag(AtomicBool);

impl RestrictedFlag {
    pub fn new(restricted: bool) -> Self {
        Self(AtomicBool::new(restricted))
    }

    pub fn set(&self, restricted: bool) {
        self.0.store(restricted, Ordering::SeqCst);
    }
}

impl HostMode for RestrictedFlag {
    fn is_restricted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reads `KEYBRIDGE_EPHEMERAL` on every query. `1`, `true`, `yes`
/// (any case) mean restricted.
#[derive(Debug, Clone)]
pub struct EnvHostMode {
    var: String,
}

impl EnvHostMode {
    pub fn new() -> Self {
        Self::with_var(EPHEMERAL_ENV)
    }

    pub fn with_var(var: &str) -> Self {
        Self {
            var: var.to_string(),
        }
    }
}

impl Default for EnvHostMode {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMode for EnvHostMode {
    fn is_restricted(&self) -> bool {
        std::env::var(&self.var)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }
}
