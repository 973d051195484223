// Keybridge — Failure Classifier
//
// Separates failures caused by the restricted context's missing APIs
// from failures that belong to the call itself. Matching is text based;
// callers only see the `FailureClassifier` trait.

use std::sync::Arc;

use super::HostMode;
use crate::keyring::KeyringError;

/// Text fragments that identify a missing device or page API.
pub const CAPABILITY_MARKERS: &[&str] = &[
    "navigator.hid",
    "navigator.usb",
    "navigator.bluetooth",
    "navigator.serial",
    "document is not defined",
    "window is not defined",
];

pub trait FailureClassifier: Send + Sync {
    /// True when `error` should be retried in the foreground context.
    fn is_capability_loss(&self, error: &KeyringError) -> bool;
}

pub struct MarkerClassifier {
    host: Arc<dyn HostMode>,
    markers: Vec<String>,
}

impl MarkerClassifier {
    pub fn new(host: Arc<dyn HostMode>) -> Self {
        Self::with_markers(host, CAPABILITY_MARKERS.iter().copied())
    }

    pub fn with_markers<'a>(
        host: Arc<dyn HostMode>,
        markers: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            host,
            markers: markers.into_iter().map(str::to_string).collect(),
        }
    }
}

impl FailureClassifier for MarkerClassifier {
    fn is_capability_loss(&self, error: &KeyringError) -> bool {
        if !self.host.is_restricted() {
            return false;
        }
        let Some(text) = error.diagnostic_text() else {
            return false;
        };
        self.markers.iter().any(|m| text.contains(m.as_str()))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
