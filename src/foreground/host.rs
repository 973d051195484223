// Keybridge — Foreground Host
//
// Executes bridged calls. Each request re-hydrates the driver from the
// background's prior state, so the foreground never trusts its own copy
// of a driver's state across calls. Requests are handled one at a time.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::bridge::{BridgeEnvelope, BridgeRequest, HostMode, Outcome, RestrictedFlag, TransportError};
use crate::keyring::{EmulatedDevice, Keyring, KeyringError, KeyringRegistry, KeyringType};
use crate::policy::PolicyTable;

pub struct ForegroundHost {
    registry: KeyringRegistry,
    table: Arc<PolicyTable>,
    // Held from deserialize to serialize so concurrent connections never
    // interleave on one driver.
    turn: Mutex<()>,
}

impl ForegroundHost {
    pub fn new(registry: KeyringRegistry, table: Arc<PolicyTable>) -> Self {
        Self {
            registry,
            table,
            turn: Mutex::new(()),
        }
    }

    /// A host backed by emulated devices for every hardware keyring type.
    pub fn emulated(table: Arc<PolicyTable>) -> Self {
        // The foreground always has full device access.
        let host: Arc<dyn HostMode> = Arc::new(RestrictedFlag::new(false));
        let registry = KeyringType::HARDWARE
            .into_iter()
            .fold(KeyringRegistry::new(), |registry, keyring_type| {
                let host = Arc::clone(&host);
                registry.register(keyring_type, move || {
                    Arc::new(EmulatedDevice::new(keyring_type, Arc::clone(&host)))
                })
            });
        Self::new(registry, table)
    }

    pub fn keyring_types(&self) -> Vec<KeyringType> {
        self.registry.types()
    }

    /// Run one bridged call.
    pub async fn handle(&self, request: &BridgeRequest) -> Result<Outcome, KeyringError> {
        let keyring = self
            .registry
            .get_or_construct(request.keyring_type)
            .ok_or_else(|| {
                KeyringError::failure(format!(
                    "No {} keyring available in the foreground",
                    request.keyring_type
                ))
            })?;
        let policy = self
            .table
            .lookup(request.keyring_type, &request.method)
            .map_err(|e| KeyringError::failure(e.to_string()))?;

        let _turn = self.turn.lock().await;
        keyring.deserialize(request.prior_state.clone()).await?;
        let args = policy.args_transform.restore(&request.args, &request.method)?;
        let response = keyring.call(&request.method, &args).await?;
        let response = policy.result_transform.prepare(response, &request.method)?;
        let new_state = keyring.serialize().await?;

        tracing::debug!(
            id = request.id,
            keyring = %request.keyring_type,
            method = %request.method,
            "Foreground call completed"
        );
        Ok(Outcome {
            new_state,
            response,
        })
    }

    /// Answer envelopes from a channel transport until it detaches.
    pub async fn serve(self: Arc<Self>, mut envelopes: mpsc::UnboundedReceiver<BridgeEnvelope>) {
        while let Some(envelope) = envelopes.recv().await {
            let result = self
                .handle(&envelope.request)
                .await
                .map_err(TransportError::Remote);
            if let Err(ref e) = result {
                tracing::warn!(id = envelope.request.id, error = %e, "Foreground call failed");
            }
            envelope.responder.settle(result);
        }
        tracing::debug!("Foreground listener detached");
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
