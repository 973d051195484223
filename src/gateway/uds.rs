// Keybridge — Unix Domain Socket Server
//
// Foreground side of the socket transport. Listens for newline-delimited
// JSON-RPC 2.0 requests from background processes and runs each bridged
// call on the foreground host. Each connection gets its own tokio task.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

use crate::bridge::BridgeRequest;
use crate::error::Result;
use crate::foreground::ForegroundHost;

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_INVOKE,
    METHOD_LIST, METHOD_NOT_FOUND,
};

/// Overrides the socket location for both server and client.
pub const SOCKET_ENV: &str = "KEYBRIDGE_SOCKET";

/// Default socket path: `$KEYBRIDGE_SOCKET`, else
/// `$XDG_RUNTIME_DIR/keybridge/keybridge.sock`, falling back to
/// `/tmp/keybridge/keybridge.sock`.
pub fn default_socket_path() -> PathBuf {
    socket_path_from(SOCKET_ENV)
}

fn socket_path_from(var: &str) -> PathBuf {
    if let Ok(path) = std::env::var(var) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"));
    runtime_dir.join("keybridge").join("keybridge.sock")
}

/// Unix Domain Socket server hosting the foreground.
pub struct UdsServer {
    socket_path: PathBuf,
    host: Arc<ForegroundHost>,
}

impl UdsServer {
    pub fn new(socket_path: PathBuf, host: Arc<ForegroundHost>) -> Self {
        Self { socket_path, host }
    }

    pub fn socket_path(&self) -> &std::path::Path {
        &self.socket_path
    }

    /// Start the UDS server. This runs until the process is terminated.
    pub async fn run(&self) -> Result<()> {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Remove stale socket file if it exists
        if self.socket_path.exists() {
            tokio::fs::remove_file(&self.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!(
            socket = %self.socket_path.display(),
            keyrings = self.host.keyring_types().len(),
            "Keybridge foreground listening"
        );

        // Owner-only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        loop {
            let (stream, _addr) = listener.accept().await?;
            let host = Arc::clone(&self.host);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, host).await {
                    tracing::error!("Connection handler error: {}", e);
                }
            });
        }
    }
}

/// Reads newline-delimited JSON-RPC requests and writes responses.
async fn handle_connection(stream: tokio::net::UnixStream, host: Arc<ForegroundHost>) -> Result<()> {
    tracing::debug!("Background connected");

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let response = process_request(&line, &host).await;
        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Parse and dispatch a single JSON-RPC request.
async fn process_request(raw: &str, host: &ForegroundHost) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => return JsonRpcResponse::parse_error(format!("Parse error: {}", e)),
    };

    if let Err(e) = request.validate() {
        return JsonRpcResponse::error(request.id, INVALID_REQUEST, e);
    }

    match request.method.as_str() {
        METHOD_INVOKE => handle_invoke(host, request.id, request.params).await,
        METHOD_LIST => handle_list(host, request.id),
        _ => JsonRpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            format!("Unknown method: {}", request.method),
        ),
    }
}

// ─── Method Handlers ─────────────────────────────────────────────────────────

async fn handle_invoke(host: &ForegroundHost, id: Value, params: Value) -> JsonRpcResponse {
    let request: BridgeRequest = match serde_json::from_value(params) {
        Ok(r) => r,
        Err(e) => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid bridge request: {}", e))
        }
    };

    match host.handle(&request).await {
        Ok(outcome) => match serde_json::to_value(&outcome) {
            Ok(json) => JsonRpcResponse::success(id, json),
            Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
        },
        Err(e) => {
            tracing::warn!(
                bridge_id = request.id,
                keyring = %request.keyring_type,
                method = %request.method,
                error = %e,
                "Bridged call failed"
            );
            JsonRpcResponse::keyring_error(id, &e)
        }
    }
}

fn handle_list(host: &ForegroundHost, id: Value) -> JsonRpcResponse {
    match serde_json::to_value(host.keyring_types()) {
        Ok(json) => JsonRpcResponse::success(id, json),
        Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
