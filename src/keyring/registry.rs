// Keybridge — Keyring Registry
//
// Owns the keyring drivers of one execution context. Each type is
// constructed at most once, on first use, and the same instance is
// returned for the lifetime of the registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{Keyring, KeyringType};

type Factory = Box<dyn Fn() -> Arc<dyn Keyring> + Send + Sync>;

#[derive(Default)]
pub struct KeyringRegistry {
    factories: HashMap<KeyringType, Factory>,
    instances: Mutex<HashMap<KeyringType, Arc<dyn Keyring>>>,
}

impl KeyringRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register how to build a driver type. Replaces any previous factory
    /// but never an already constructed instance.
    pub fn register<F>(mut self, keyring_type: KeyringType, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Keyring> + Send + Sync + 'static,
    {
        self.factories.insert(keyring_type, Box::new(factory));
        self
    }

    /// Return the driver for `keyring_type`, constructing it on first use.
    /// `None` if the type was never registered.
    pub fn get_or_construct(&self, keyring_type: KeyringType) -> Option<Arc<dyn Keyring>> {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = instances.get(&keyring_type) {
            return Some(Arc::clone(existing));
        }

        let factory = self.factories.get(&keyring_type)?;
        let instance = factory();
        tracing::debug!(keyring = %keyring_type, "Constructed keyring driver");
        instances.insert(keyring_type, Arc::clone(&instance));
        Some(instance)
    }

    pub fn is_constructed(&self, keyring_type: KeyringType) -> bool {
        self.instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&keyring_type)
    }

    /// Registered types, sorted.
    pub fn types(&self) -> Vec<KeyringType> {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort();
        types
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
