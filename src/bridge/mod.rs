// Keybridge — Bridge Module
//
// Lets a suspendable background context hand keyring calls to a
// persistent foreground context. The interceptor decides per call, the
// pool tracks calls until hand-off, and a transport carries them across.

mod channel;
mod classifier;
mod error;
mod host_mode;
mod interceptor;
mod pool;
mod transport;

pub use channel::{BridgeEnvelope, ChannelTransport};
pub use classifier::{FailureClassifier, MarkerClassifier, CAPABILITY_MARKERS};
pub use error::TransportError;
pub use host_mode::{EnvHostMode, HostMode, RestrictedFlag, EPHEMERAL_ENV};
pub use interceptor::{BridgedKeyring, Interceptor};
pub use pool::{InvocationPool, InvocationSpec, PendingInvocation};
pub use transport::{BridgeRequest, BridgeTransport, Outcome, OutcomeResult, Responder};
