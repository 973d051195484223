// Keybridge — Method Policy Module
//
// Static per-keyring-type, per-method configuration deciding whether a
// call runs locally, in the foreground, or both, and how its arguments,
// response and state are reshaped for the bridge.

mod table;
mod transforms;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keyring::KeyringType;

pub use table::PolicyTable;
pub use transforms::{
    ArgsTransform, DecodeSignedTransaction, DeserializeInPlace, EncodeTransactionArgs, Identity,
    MapArgs, MapResult, ResultTransform, StateSync,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("No policy registered for keyring type {0}")]
    UnknownKeyringType(KeyringType),
}

// ─── Method Policy ───────────────────────────────────────────────────────────

/// Resolved policy for one (keyring type, method) pair.
#[derive(Clone)]
pub struct MethodPolicy {
    /// Never attempt locally; go straight to the foreground.
    pub skip_background: bool,
    /// Run in the foreground first, then locally.
    pub update_all: bool,
    /// Broadcast to every foreground listener instead of one.
    pub global: bool,
    pub args_transform: Arc<dyn ArgsTransform>,
    pub result_transform: Arc<dyn ResultTransform>,
    pub state_sync: Arc<dyn StateSync>,
}

impl MethodPolicy {
    pub fn summary(&self) -> PolicySummary {
        PolicySummary {
            skip_background: self.skip_background,
            update_all: self.update_all,
            global: self.global,
        }
    }
}

impl Default for MethodPolicy {
    fn default() -> Self {
        Self {
            skip_background: false,
            update_all: false,
            global: false,
            args_transform: Arc::new(Identity),
            result_transform: Arc::new(Identity),
            state_sync: Arc::new(DeserializeInPlace),
        }
    }
}

impl fmt::Debug for MethodPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodPolicy")
            .field("skip_background", &self.skip_background)
            .field("update_all", &self.update_all)
            .field("global", &self.global)
            .field("args_transform", &self.args_transform.name())
            .field("result_transform", &self.result_transform.name())
            .field("state_sync", &self.state_sync.name())
            .finish()
    }
}

/// The flag part of a policy, carried on the wire with each request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub skip_background: bool,
    pub update_all: bool,
    pub global: bool,
}

// ─── Overrides ───────────────────────────────────────────────────────────────

/// Per-method deviations from the default policy. Unset fields keep the default.
#[derive(Clone, Default)]
pub struct PolicyOverride {
    skip_background: Option<bool>,
    update_all: Option<bool>,
    global: Option<bool>,
    args_transform: Option<Arc<dyn ArgsTransform>>,
    result_transform: Option<Arc<dyn ResultTransform>>,
    state_sync: Option<Arc<dyn StateSync>>,
}

impl PolicyOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_background(mut self) -> Self {
        self.skip_background = Some(true);
        self
    }

    pub fn update_all(mut self) -> Self {
        self.update_all = Some(true);
        self
    }

    pub fn global(mut self) -> Self {
        self.global = Some(true);
        self
    }

    pub fn args_transform(mut self, transform: impl ArgsTransform + 'static) -> Self {
        self.args_transform = Some(Arc::new(transform));
        self
    }

    pub fn result_transform(mut self, transform: impl ResultTransform + 'static) -> Self {
        self.result_transform = Some(Arc::new(transform));
        self
    }

    pub fn state_sync(mut self, sync: impl StateSync + 'static) -> Self {
        self.state_sync = Some(Arc::new(sync));
        self
    }

    /// Overlay this override on `base`.
    pub fn apply(&self, base: MethodPolicy) -> MethodPolicy {
        MethodPolicy {
            skip_background: self.skip_background.unwrap_or(base.skip_background),
            update_all: self.update_all.unwrap_or(base.update_all),
            global: self.global.unwrap_or(base.global),
            args_transform: self.args_transform.clone().unwrap_or(base.args_transform),
            result_transform: self.result_transform.clone().unwrap_or(base.result_transform),
            state_sync: self.state_sync.clone().unwrap_or(base.state_sync),
        }
    }
}
