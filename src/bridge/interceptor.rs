// Keybridge — Call Interceptor
//
// Every keyring operation goes through `BridgedKeyring::invoke`, which
// consults the method policy, tries the local driver where allowed, and
// reroutes to the foreground when policy demands it or the local attempt
// failed for lack of a host capability.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::pool::{InvocationPool, InvocationSpec};
use super::FailureClassifier;
use crate::error::BridgeError;
use crate::keyring::{Keyring, KeyringType};
use crate::policy::{MethodPolicy, PolicyError, PolicyTable};

/// Shared wiring for building bridged keyrings.
#[derive(Clone)]
pub struct Interceptor {
    table: Arc<PolicyTable>,
    classifier: Arc<dyn FailureClassifier>,
    pool: Arc<InvocationPool>,
}

impl Interceptor {
    pub fn new(
        table: Arc<PolicyTable>,
        classifier: Arc<dyn FailureClassifier>,
        pool: Arc<InvocationPool>,
    ) -> Self {
        Self {
            table,
            classifier,
            pool,
        }
    }

    pub fn pool(&self) -> &Arc<InvocationPool> {
        &self.pool
    }

    /// Wrap a driver. Policies for every exposed method are resolved here,
    /// so an unregistered keyring type fails at construction.
    pub fn wrap(&self, keyring: Arc<dyn Keyring>) -> Result<BridgedKeyring, PolicyError> {
        let keyring_type = keyring.keyring_type();
        self.table.ensure_registered(keyring_type)?;

        let mut dispatch = HashMap::new();
        for method in keyring.methods() {
            dispatch.insert(method.to_string(), self.table.lookup(keyring_type, method)?);
        }

        Ok(BridgedKeyring {
            keyring,
            dispatch,
            wiring: self.clone(),
        })
    }
}

/// A keyring whose every call may transparently cross the bridge.
pub struct BridgedKeyring {
    keyring: Arc<dyn Keyring>,
    dispatch: HashMap<String, MethodPolicy>,
    wiring: Interceptor,
}

impl BridgedKeyring {
    pub fn keyring_type(&self) -> KeyringType {
        self.keyring.keyring_type()
    }

    pub fn inner(&self) -> &Arc<dyn Keyring> {
        &self.keyring
    }

    fn policy_for(&self, method: &str) -> Result<MethodPolicy, PolicyError> {
        match self.dispatch.get(method) {
            Some(policy) => Ok(policy.clone()),
            None => self.wiring.table.lookup(self.keyring_type(), method),
        }
    }

    /// Call `method` with `args`, locally or through the bridge as policy
    /// and circumstances dictate.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, BridgeError> {
        let prior_state = self.keyring.serialize().await?;
        let policy = self.policy_for(method)?;

        if policy.skip_background {
            tracing::debug!(keyring = %self.keyring_type(), method, "Bridging without local attempt");
            return self.bridge(method, &args, prior_state, &policy).await;
        }

        if policy.update_all {
            tracing::debug!(keyring = %self.keyring_type(), method, "Bridging before local attempt");
            let bridged = self.bridge(method, &args, prior_state, &policy).await?;
            return match self.keyring.call(method, &args).await {
                Ok(local) => Ok(local),
                // The foreground already ran this call from the same prior state.
                Err(e) if self.wiring.classifier.is_capability_loss(&e) => Ok(bridged),
                Err(e) => Err(e.into()),
            };
        }

        match self.keyring.call(method, &args).await {
            Ok(result) => Ok(result),
            Err(e) if self.wiring.classifier.is_capability_loss(&e) => {
                tracing::debug!(
                    keyring = %self.keyring_type(),
                    method,
                    error = %e,
                    "Local call lost host capability, bridging"
                );
                self.bridge(method, &args, prior_state, &policy).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn bridge(
        &self,
        method: &str,
        args: &[Value],
        prior_state: Value,
        policy: &MethodPolicy,
    ) -> Result<Value, BridgeError> {
        let keyring = self.keyring.as_ref();
        let transformed = policy.args_transform.transform(args, keyring, method)?;

        let pending = self.wiring.pool.enqueue(InvocationSpec {
            keyring_type: keyring.keyring_type(),
            method: method.to_string(),
            args: transformed,
            prior_state,
            policy: policy.summary(),
        });
        let id = pending.id();
        let outcome = pending.outcome().await?;
        tracing::debug!(id, method, "Bridge outcome received");

        policy.state_sync.sync(keyring, outcome.new_state).await?;
        let response = policy
            .result_transform
            .transform(outcome.response, args, keyring, method)
            .await?;
        Ok(response)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::pool::recording::RecordingTransport;
    use crate::bridge::{MarkerClassifier, Outcome, RestrictedFlag, TransportError};
    use crate::keyring::mock::MockKeyring;
    use crate::keyring::KeyringError;
    use crate::policy::{MapArgs, MapResult, PolicyOverride};
    use serde_json::json;

    struct Harness {
        transport: Arc<RecordingTransport>,
        flag: Arc<RestrictedFlag>,
        interceptor: Interceptor,
    }

    fn harness(table: PolicyTable, restricted: bool) -> Harness {
        harness_with(table, restricted, RecordingTransport::new())
    }

    fn harness_with(table: PolicyTable, restricted: bool, transport: RecordingTransport) -> Harness {
        let transport = Arc::new(transport);
        let flag = Arc::new(RestrictedFlag::new(restricted));
        let pool = Arc::new(InvocationPool::new(transport.clone()));
        let interceptor = Interceptor::new(
            Arc::new(table),
            Arc::new(MarkerClassifier::new(flag.clone())),
            pool,
        );
        Harness {
            transport,
            flag,
            interceptor,
        }
    }

    /// Resolve the `index`-th request once it shows up.
    fn answer_when_sent(transport: Arc<RecordingTransport>, index: usize, outcome: Outcome) {
        tokio::spawn(async move {
            while transport.count() <= index {
                tokio::task::yield_now().await;
            }
            transport.responder(index).resolve(outcome);
        });
    }

    fn usb_error() -> KeyringError {
        KeyringError::failure("Failed to open device: navigator.usb is undefined")
    }

    fn tagging_table(keyring_type: KeyringType) -> PolicyTable {
        PolicyTable::new().with_override(
            keyring_type,
            "getModel",
            PolicyOverride::new()
                .args_transform(MapArgs("tag-args", |args: &[Value]| -> Result<Vec<Value>, KeyringError> {
                    let mut out = args.to_vec();
                    out.push(json!("transformed"));
                    Ok(out)
                }))
                .result_transform(MapResult("tag-result", |v: Value, _: &[Value]| -> Result<Value, KeyringError> {
                    Ok(json!({ "model": v }))
                })),
        )
    }

    #[tokio::test]
    async fn test_skip_background_never_calls_local() {
        let h = harness(PolicyTable::hardware(), false);
        let mock = Arc::new(MockKeyring::new(KeyringType::Trezor).respond("getFirstPage", Ok(json!(["local"]))));
        let keyring = h.interceptor.wrap(mock.clone()).unwrap();

        answer_when_sent(
            h.transport.clone(),
            0,
            Outcome {
                new_state: json!({ "page": 0 }),
                response: json!(["0x1", "0x2"]),
            },
        );
        let result = keyring.invoke("getFirstPage", vec![]).await.unwrap();

        assert_eq!(result, json!(["0x1", "0x2"]));
        assert!(!mock.was_called("getFirstPage"));
        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "getFirstPage");
        assert!(requests[0].policy.skip_background);
        // Prior state is captured even when no local attempt happens.
        assert_eq!(mock.serialize_count(), 1);
        assert_eq!(requests[0].prior_state, json!({ "page": 0 }));
    }

    #[tokio::test]
    async fn test_local_success_never_touches_transport() {
        let h = harness(PolicyTable::hardware(), true);
        let signed = json!({ "v": 37, "r": [1], "s": [2] });
        let mock = Arc::new(
            MockKeyring::new(KeyringType::Ledger).respond("signTransaction", Ok(signed.clone())),
        );
        let keyring = h.interceptor.wrap(mock.clone()).unwrap();

        let args = vec![json!("0xabc"), json!({ "nonce": 1 })];
        let result = keyring.invoke("signTransaction", args.clone()).await.unwrap();

        assert_eq!(result, signed);
        assert_eq!(h.transport.count(), 0);
        assert_eq!(mock.calls(), vec![("signTransaction".to_string(), args)]);
    }

    #[tokio::test]
    async fn test_capability_loss_falls_back_to_bridge() {
        let h = harness(tagging_table(KeyringType::Ledger), true);
        let mock = Arc::new(MockKeyring::new(KeyringType::Ledger).respond("getModel", Err(usb_error())));
        let keyring = h.interceptor.wrap(mock.clone()).unwrap();

        let new_state = json!({ "page": 9, "model": "nanoX" });
        answer_when_sent(
            h.transport.clone(),
            0,
            Outcome {
                new_state: new_state.clone(),
                response: json!("nanoX"),
            },
        );
        let result = keyring.invoke("getModel", vec![json!(1)]).await.unwrap();

        assert_eq!(result, json!({ "model": "nanoX" }));
        assert_eq!(mock.state(), new_state);
        assert!(mock.was_called("getModel"));

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].args, vec![json!(1), json!("transformed")]);
        assert_eq!(requests[0].prior_state, json!({ "page": 0 }));
        assert!(h.interceptor.pool().is_empty());
    }

    #[tokio::test]
    async fn test_unrestricted_host_rethrows_original_error() {
        let h = harness(tagging_table(KeyringType::Ledger), false);
        let mock = Arc::new(MockKeyring::new(KeyringType::Ledger).respond("getModel", Err(usb_error())));
        let keyring = h.interceptor.wrap(mock).unwrap();

        let err = keyring.invoke("getModel", vec![]).await.unwrap_err();
        assert!(matches!(err, BridgeError::Keyring(ref e) if *e == usb_error()));
        assert_eq!(h.transport.count(), 0);
        assert!(h.interceptor.pool().is_empty());
    }

    #[tokio::test]
    async fn test_host_mode_change_takes_effect_immediately() {
        let h = harness(tagging_table(KeyringType::Ledger), false);
        let mock = Arc::new(MockKeyring::new(KeyringType::Ledger).respond("getModel", Err(usb_error())));
        let keyring = h.interceptor.wrap(mock).unwrap();

        assert!(keyring.invoke("getModel", vec![]).await.is_err());
        assert_eq!(h.transport.count(), 0);

        h.flag.set(true);
        answer_when_sent(
            h.transport.clone(),
            0,
            Outcome {
                new_state: json!({}),
                response: json!("T"),
            },
        );
        assert!(keyring.invoke("getModel", vec![]).await.is_ok());
        assert_eq!(h.transport.count(), 1);
    }

    #[tokio::test]
    async fn test_caller_errors_are_not_bridged() {
        let h = harness(PolicyTable::hardware(), true);
        let refusal = KeyringError::failure("Ledger device: Condition of use not satisfied (denied by the user?) (0x6985)");
        let mock = Arc::new(MockKeyring::new(KeyringType::Ledger).respond("signTransaction", Err(refusal.clone())));
        let keyring = h.interceptor.wrap(mock).unwrap();

        let err = keyring
            .invoke("signTransaction", vec![json!("0xabc"), json!({})])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Keyring(ref e) if *e == refusal));
        assert_eq!(h.transport.count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let h = harness_with(
            PolicyTable::hardware(),
            false,
            RecordingTransport::refusing(TransportError::NoForeground),
        );
        let mock = Arc::new(MockKeyring::new(KeyringType::Trezor));
        let keyring = h.interceptor.wrap(mock).unwrap();

        let err = keyring.invoke("getModel", vec![]).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(TransportError::NoForeground)));
    }

    #[tokio::test]
    async fn test_remote_rejection_propagates_unchanged() {
        let h = harness(PolicyTable::hardware(), false);
        let mock = Arc::new(MockKeyring::new(KeyringType::Trezor));
        let keyring = h.interceptor.wrap(mock).unwrap();

        let transport = h.transport.clone();
        tokio::spawn(async move {
            while transport.count() == 0 {
                tokio::task::yield_now().await;
            }
            transport
                .responder(0)
                .reject(TransportError::Remote(KeyringError::failure("Action cancelled by user")));
        });

        let err = keyring.invoke("getModel", vec![]).await.unwrap_err();
        match err {
            BridgeError::Transport(TransportError::Remote(e)) => {
                assert_eq!(e.to_string(), "Action cancelled by user")
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_update_all_bridges_then_runs_locally() {
        let h = harness(PolicyTable::hardware(), false);
        let mock = Arc::new(MockKeyring::new(KeyringType::Ledger).respond("init", Ok(json!("local"))));
        let keyring = h.interceptor.wrap(mock.clone()).unwrap();

        answer_when_sent(
            h.transport.clone(),
            0,
            Outcome {
                new_state: json!({ "page": 0, "unlocked": true }),
                response: json!("remote"),
            },
        );
        let result = keyring.invoke("init", vec![]).await.unwrap();

        assert_eq!(result, json!("local"));
        assert!(mock.was_called("init"));
        assert_eq!(mock.state(), json!({ "page": 0, "unlocked": true }));
        assert!(h.transport.requests()[0].policy.update_all);
    }

    #[tokio::test]
    async fn test_update_all_falls_back_to_bridged_result() {
        let h = harness(PolicyTable::hardware(), true);
        let mock = Arc::new(MockKeyring::new(KeyringType::Ledger).respond("init", Err(usb_error())));
        let keyring = h.interceptor.wrap(mock).unwrap();

        answer_when_sent(
            h.transport.clone(),
            0,
            Outcome {
                new_state: json!({}),
                response: json!("remote"),
            },
        );
        assert_eq!(keyring.invoke("init", vec![]).await.unwrap(), json!("remote"));
    }

    #[tokio::test]
    async fn test_update_all_local_caller_error_propagates() {
        let h = harness(PolicyTable::hardware(), true);
        let refusal = KeyringError::failure("Ledger device: UNKNOWN_ERROR (0x6a80)");
        let mock = Arc::new(MockKeyring::new(KeyringType::Ledger).respond("init", Err(refusal.clone())));
        let keyring = h.interceptor.wrap(mock.clone()).unwrap();

        answer_when_sent(
            h.transport.clone(),
            0,
            Outcome {
                new_state: json!({}),
                response: json!("remote"),
            },
        );
        let err = keyring.invoke("init", vec![]).await.unwrap_err();

        assert!(matches!(err, BridgeError::Keyring(ref e) if *e == refusal));
        assert!(mock.was_called("init"));
        assert_eq!(h.transport.count(), 1);
    }

    #[tokio::test]
    async fn test_update_all_bridge_failure_skips_local_call() {
        let h = harness_with(
            PolicyTable::hardware(),
            true,
            RecordingTransport::refusing(TransportError::NoForeground),
        );
        let mock = Arc::new(MockKeyring::new(KeyringType::Ledger).respond("init", Ok(json!("local"))));
        let keyring = h.interceptor.wrap(mock.clone()).unwrap();

        let err = keyring.invoke("init", vec![]).await.unwrap_err();

        assert!(matches!(err, BridgeError::Transport(TransportError::NoForeground)));
        assert!(!mock.was_called("init"));
    }

    #[tokio::test]
    async fn test_teardown_is_sent_as_global() {
        let h = harness(PolicyTable::hardware(), false);
        let mock = Arc::new(MockKeyring::new(KeyringType::Trezor).respond("destroy", Ok(Value::Null)));
        let keyring = h.interceptor.wrap(mock).unwrap();

        answer_when_sent(
            h.transport.clone(),
            0,
            Outcome {
                new_state: json!({}),
                response: Value::Null,
            },
        );
        keyring.invoke("destroy", vec![]).await.unwrap();
        assert!(h.transport.requests()[0].policy.global);
    }

    #[tokio::test]
    async fn test_unregistered_type_fails_at_wrap() {
        let h = harness(PolicyTable::hardware(), false);
        let mock = Arc::new(MockKeyring::new(KeyringType::HdKeyTree));
        let err = h.interceptor.wrap(mock).err().unwrap();
        assert_eq!(err, PolicyError::UnknownKeyringType(KeyringType::HdKeyTree));
    }
}
