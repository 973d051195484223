// Keybridge — In-Process Channel Transport
//
// Connects the background side to foreground listeners living in the
// same process over unbounded tokio channels. A global request reaches
// every listener; anything else goes to the first live one.

use std::sync::Mutex;

use tokio::sync::mpsc;

use super::transport::{BridgeRequest, BridgeTransport, Responder};
use super::TransportError;

/// A request as a foreground listener receives it.
pub struct BridgeEnvelope {
    pub request: BridgeRequest,
    pub responder: Responder,
}

#[derive(Default)]
pub struct ChannelTransport {
    listeners: Mutex<Vec<mpsc::UnboundedSender<BridgeEnvelope>>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new foreground listener. Dropping the receiver detaches it.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<BridgeEnvelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Live listeners. Closed ones are pruned.
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.lock();
        listeners.retain(|l| !l.is_closed());
        listeners.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<BridgeEnvelope>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BridgeTransport for ChannelTransport {
    fn send(&self, request: BridgeRequest, responder: Responder) -> Result<(), TransportError> {
        let mut listeners = self.lock();
        listeners.retain(|l| !l.is_closed());

        if request.policy.global {
            let delivered = listeners
                .iter()
                .filter(|l| {
                    l.send(BridgeEnvelope {
                        request: request.clone(),
                        responder: responder.clone(),
                    })
                    .is_ok()
                })
                .count();
            tracing::debug!(id = request.id, delivered, "Broadcast bridge invocation");
            return if delivered > 0 {
                Ok(())
            } else {
                Err(TransportError::NoForeground)
            };
        }

        let mut envelope = BridgeEnvelope { request, responder };
        for listener in listeners.iter() {
            match listener.send(envelope) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(returned)) => envelope = returned,
            }
        }
        Err(TransportError::NoForeground)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
