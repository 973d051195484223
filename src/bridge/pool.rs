// Keybridge — Invocation Pool
//
// Holds bridged calls until they are handed to the transport. An
// invocation leaves the pool at hand-off, not when its outcome arrives,
// so an unresponsive foreground never holds up later calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::oneshot;

use super::transport::{BridgeRequest, BridgeTransport, Outcome, OutcomeResult, Responder};
use super::TransportError;
use crate::keyring::KeyringType;
use crate::policy::PolicySummary;

/// What the interceptor knows about a call that must cross the bridge.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    pub keyring_type: KeyringType,
    pub method: String,
    pub args: Vec<Value>,
    pub prior_state: Value,
    pub policy: PolicySummary,
}

/// A queued call and the responder that settles it.
struct Invocation {
    id: u64,
    spec: InvocationSpec,
    created_at: DateTime<Utc>,
    responder: Responder,
}

impl Invocation {
    fn into_parts(self) -> (BridgeRequest, Responder) {
        let request = BridgeRequest {
            id: self.id,
            keyring_type: self.spec.keyring_type,
            method: self.spec.method,
            args: self.spec.args,
            prior_state: self.spec.prior_state,
            created_at: self.created_at,
            policy: self.spec.policy,
        };
        (request, self.responder)
    }
}

/// Caller-side handle of an enqueued invocation.
pub struct PendingInvocation {
    id: u64,
    receiver: oneshot::Receiver<OutcomeResult>,
}

impl PendingInvocation {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the foreground's outcome.
    pub async fn outcome(self) -> Result<Outcome, TransportError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Disconnected(self.id)),
        }
    }
}

pub struct InvocationPool {
    transport: Arc<dyn BridgeTransport>,
    queue: Mutex<VecDeque<Invocation>>,
    next_id: AtomicU64,
}

impl InvocationPool {
    pub fn new(transport: Arc<dyn BridgeTransport>) -> Self {
        Self {
            transport,
            queue: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Queue an invocation and flush right away.
    pub fn enqueue(&self, spec: InvocationSpec) -> PendingInvocation {
        let pending = self.stage(spec);
        self.flush();
        pending
    }

    /// Queue an invocation without flushing.
    pub fn stage(&self, spec: InvocationSpec) -> PendingInvocation {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (responder, receiver) = Responder::channel(id);
        tracing::debug!(id, method = %spec.method, keyring = %spec.keyring_type, "Queued bridge invocation");

        self.lock().push_back(Invocation {
            id,
            spec,
            created_at: Utc::now(),
            responder,
        });
        PendingInvocation { id, receiver }
    }

    /// Hand every queued invocation to the transport in FIFO order.
    /// Returns how many were dispatched.
    ///
    /// The queue is drained under the lock and the lock released before
    /// the transport is called, so responders settling from inside `send`
    /// never observe a half-drained queue.
    pub fn flush(&self) -> usize {
        let batch: Vec<Invocation> = self.lock().drain(..).collect();
        let count = batch.len();

        for invocation in batch {
            let (request, responder) = invocation.into_parts();
            let id = request.id;
            if let Err(e) = self.transport.send(request, responder.clone()) {
                tracing::warn!(id, error = %e, "Bridge transport refused invocation");
                responder.reject(e);
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Invocation>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ─── Recording Transport for Testing ─────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
