// Keybridge — Bridge Transport Contract
//
// The payload that crosses the bridge, the outcome that comes back, and
// the one-shot responder a transport uses to settle an invocation.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use super::TransportError;
use crate::keyring::KeyringType;
use crate::policy::PolicySummary;

/// One bridged call as the foreground receives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    /// Correlation id assigned by the invocation pool.
    pub id: u64,
    pub keyring_type: KeyringType,
    pub method: String,
    pub args: Vec<Value>,
    pub prior_state: Value,
    pub created_at: DateTime<Utc>,
    pub policy: PolicySummary,
}

/// The foreground's answer: the driver's state after the call and the
/// call's response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub new_state: Value,
    pub response: Value,
}

pub type OutcomeResult = Result<Outcome, TransportError>;

/// Settles exactly one invocation.
///
/// Clones share a single slot: the first `settle` delivers, every later
/// one is a no-op returning `false`. Dropping every clone without settling
/// rejects the invocation with [`TransportError::Disconnected`].
#[derive(Clone)]
pub struct Responder {
    id: u64,
    slot: Arc<Mutex<Option<oneshot::Sender<OutcomeResult>>>>,
}

impl Responder {
    pub(crate) fn channel(id: u64) -> (Self, oneshot::Receiver<OutcomeResult>) {
        let (tx, rx) = oneshot::channel();
        let responder = Self {
            id,
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (responder, rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn settle(&self, outcome: OutcomeResult) -> bool {
        let sender = self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        match sender {
            Some(sender) => {
                if sender.send(outcome).is_err() {
                    tracing::debug!(id = self.id, "Caller stopped waiting before the outcome arrived");
                }
                true
            }
            None => {
                tracing::debug!(id = self.id, "Ignoring outcome for already settled invocation");
                false
            }
        }
    }

    pub fn resolve(&self, outcome: Outcome) -> bool {
        self.settle(Ok(outcome))
    }

    pub fn reject(&self, error: TransportError) -> bool {
        self.settle(Err(error))
    }

    pub fn is_settled(&self) -> bool {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }
}

/// Delivers bridge requests to the foreground.
///
/// `send` must not block on the outcome: it hands the request off and
/// returns, keeping the responder to settle later. An `Err` is a
/// synchronous failure and the caller rejects the invocation with it.
pub trait BridgeTransport: Send + Sync {
    fn send(&self, request: BridgeRequest, responder: Responder) -> Result<(), TransportError>;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(n: i64) -> Outcome {
        Outcome {
            new_state: Value::Null,
            response: Value::from(n),
        }
    }

    #[tokio::test]
    async fn test_first_settle_wins() {
        let (responder, rx) = Responder::channel(1);
        let twin = responder.clone();

        assert!(responder.resolve(outcome(1)));
        assert!(!twin.resolve(outcome(2)));
        assert!(!twin.reject(TransportError::NoForeground));
        assert!(twin.is_settled());

        assert_eq!(rx.await.unwrap().unwrap().response, Value::from(1));
    }

    #[tokio::test]
    async fn test_dropping_all_clones_closes_channel() {
        let (responder, rx) = Responder::channel(9);
        drop(responder.clone());
        drop(responder);
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_request_wire_shape_is_camel_case() {
        let request = BridgeRequest {
            id: 4,
            keyring_type: KeyringType::Ledger,
            method: "getModel".into(),
            args: vec![],
            prior_state: serde_json::json!({ "page": 1 }),
            created_at: Utc::now(),
            policy: PolicySummary::default(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["keyringType"], "Ledger Hardware");
        assert_eq!(json["priorState"]["page"], 1);
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["policy"]["skipBackground"], false);
    }
}
