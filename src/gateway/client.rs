// Keybridge — Unix Domain Socket Transport
//
// Background side of the socket transport. Each bridged call opens a
// connection to the foreground gateway, writes one JSON-RPC request and
// settles the responder with whatever comes back.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::bridge::{BridgeRequest, BridgeTransport, Outcome, Responder, TransportError};
use crate::keyring::{KeyringError, KeyringType};

use super::protocol::{JsonRpcRequest, JsonRpcResponse, KEYRING_ERROR, METHOD_INVOKE, METHOD_LIST};

pub struct UdsTransport {
    socket_path: PathBuf,
    next_rpc_id: AtomicU64,
}

impl UdsTransport {
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            next_rpc_id: AtomicU64::new(1),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Keyring types the foreground currently hosts.
    pub async fn list_keyrings(&self) -> Result<Vec<KeyringType>, TransportError> {
        let id = self.next_rpc_id.fetch_add(1, Ordering::Relaxed);
        let result = round_trip(&self.socket_path, JsonRpcRequest::new(id, METHOD_LIST, Value::Null)).await?;
        Ok(serde_json::from_value(result)?)
    }
}

impl BridgeTransport for UdsTransport {
    fn send(&self, request: BridgeRequest, responder: Responder) -> Result<(), TransportError> {
        if !self.socket_path.exists() {
            return Err(TransportError::NoForeground);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let rpc_id = self.next_rpc_id.fetch_add(1, Ordering::Relaxed);
        let rpc = JsonRpcRequest::new(rpc_id, METHOD_INVOKE, serde_json::to_value(&request)?);
        let socket_path = self.socket_path.clone();

        runtime.spawn(async move {
            let outcome = round_trip(&socket_path, rpc)
                .await
                .and_then(|result| serde_json::from_value::<Outcome>(result).map_err(TransportError::from));
            if let Err(ref e) = outcome {
                tracing::debug!(id = request.id, error = %e, "Socket round trip failed");
            }
            responder.settle(outcome);
        });
        Ok(())
    }
}

/// One request, one response line.
async fn round_trip(socket_path: &Path, request: JsonRpcRequest) -> Result<Value, TransportError> {
    let stream = UnixStream::connect(socket_path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
            TransportError::NoForeground
        }
        _ => e.into(),
    })?;
    let (reader, mut writer) = stream.into_split();

    let mut line = serde_json::to_string(&request)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;

    let mut lines = BufReader::new(reader).lines();
    let raw = lines.next_line().await?.ok_or_else(|| {
        TransportError::Protocol("Foreground closed the connection without a response".into())
    })?;
    let response: JsonRpcResponse = serde_json::from_str(&raw)?;

    if let Some(error) = response.error {
        if error.code == KEYRING_ERROR {
            if let Some(data) = error.data {
                let remote: KeyringError = serde_json::from_value(data)?;
                return Err(TransportError::Remote(remote));
            }
            return Err(TransportError::Remote(KeyringError::failure(error.message)));
        }
        return Err(TransportError::Protocol(format!("{} ({})", error.message, error.code)));
    }
    response
        .result
        .ok_or_else(|| TransportError::Protocol("Response carried neither result nor error".into()))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use crate::bridge::{Interceptor, InvocationPool, MarkerClassifier, RestrictedFlag};
    use crate::error::BridgeError;
    use crate::foreground::ForegroundHost;
    use crate::gateway::UdsServer;
    use crate::keyring::{EmulatedDevice, Keyring};
    use crate::policy::PolicyTable;

    async fn start_server(dir: &tempfile::TempDir) -> PathBuf {
        let socket = dir.path().join("keybridge.sock");
        let host = Arc::new(ForegroundHost::emulated(Arc::new(PolicyTable::hardware())));
        let server = UdsServer::new(socket.clone(), host);
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        for _ in 0..100 {
            if UnixStream::connect(&socket).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        socket
    }

    #[tokio::test]
    async fn test_missing_socket_is_no_foreground() {
        let dir = tempfile::tempdir().unwrap();
        let transport = UdsTransport::new(dir.path().join("absent.sock"));
        let pool = InvocationPool::new(Arc::new(transport));
        let err = pool
            .enqueue(crate::bridge::InvocationSpec {
                keyring_type: KeyringType::Ledger,
                method: "getModel".into(),
                args: vec![],
                prior_state: json!({}),
                policy: Default::default(),
            })
            .outcome()
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NoForeground);
    }

    #[tokio::test]
    async fn test_list_keyrings_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = start_server(&dir).await;

        let types = UdsTransport::new(socket).list_keyrings().await.unwrap();
        assert!(types.contains(&KeyringType::Ledger));
        assert!(!types.contains(&KeyringType::HdKeyTree));
    }

    #[tokio::test]
    async fn test_restricted_background_bridges_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = start_server(&dir).await;

        let flag = Arc::new(RestrictedFlag::new(true));
        let interceptor = Interceptor::new(
            Arc::new(PolicyTable::hardware()),
            Arc::new(MarkerClassifier::new(flag.clone())),
            Arc::new(InvocationPool::new(Arc::new(UdsTransport::new(socket)))),
        );
        let device = Arc::new(EmulatedDevice::new(KeyringType::Trezor, flag));
        let keyring = interceptor.wrap(device.clone()).unwrap();

        keyring.invoke("getFirstPage", vec![]).await.unwrap();
        let page = keyring.invoke("getNextPage", vec![]).await.unwrap();
        assert_eq!(page[0]["index"], 5);
        assert_eq!(device.serialize().await.unwrap()["page"], 1);

        // Foreground failures come back as the keyring's own error.
        keyring.invoke("getPreviousPage", vec![]).await.unwrap();
        let err = keyring.invoke("getPreviousPage", vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Transport(TransportError::Remote(KeyringError::Failure { .. }))
        ));
    }
}
