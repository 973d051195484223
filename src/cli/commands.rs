// Keybridge — CLI Command Handlers
//
// Each function handles one CLI subcommand. `serve` runs the foreground
// over a Unix socket; `call` plays the background side against it.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::bridge::{EnvHostMode, HostMode, Interceptor, InvocationPool, MarkerClassifier, RestrictedFlag};
use crate::error::BridgeError;
use crate::foreground::ForegroundHost;
use crate::gateway::{default_socket_path, UdsServer, UdsTransport};
use crate::keyring::{EmulatedDevice, Keyring, KeyringType};
use crate::policy::{MethodPolicy, PolicyTable};

use super::Commands;

/// Execute the parsed CLI command.
pub async fn execute(command: Commands) -> Result<(), BridgeError> {
    match command {
        Commands::Serve { socket } => cmd_serve(socket).await,
        Commands::Call {
            keyring,
            method,
            args,
            state,
            ephemeral,
            socket,
        } => cmd_call(keyring, method, args, state, ephemeral, socket).await,
        Commands::Keyrings { socket } => cmd_keyrings(socket).await,
        Commands::Policy { keyring, method } => cmd_policy(keyring, method),
    }
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn cmd_serve(socket: Option<PathBuf>) -> Result<(), BridgeError> {
    let socket_path = socket.unwrap_or_else(default_socket_path);
    let host = Arc::new(ForegroundHost::emulated(Arc::new(PolicyTable::hardware())));

    println!("Starting Keybridge foreground at {}...", socket_path.display());
    UdsServer::new(socket_path, host).run().await
}

// ─── Call ────────────────────────────────────────────────────────────────────

async fn cmd_call(
    keyring: String,
    method: String,
    args: String,
    state: Option<String>,
    ephemeral: bool,
    socket: Option<PathBuf>,
) -> Result<(), BridgeError> {
    let keyring_type = parse_keyring(&keyring)?;
    let args: Vec<Value> = serde_json::from_str(&args)
        .map_err(|e| BridgeError::Other(format!("--args must be a JSON array: {}", e)))?;

    let host: Arc<dyn HostMode> = if ephemeral {
        Arc::new(RestrictedFlag::new(true))
    } else {
        Arc::new(EnvHostMode::new())
    };
    tracing::debug!(restricted = host.is_restricted(), "Background host mode");

    let device = Arc::new(EmulatedDevice::new(keyring_type, Arc::clone(&host)));
    if let Some(state) = state {
        device.deserialize(serde_json::from_str(&state)?).await?;
    }

    let transport = UdsTransport::new(socket.unwrap_or_else(default_socket_path));
    let interceptor = Interceptor::new(
        Arc::new(PolicyTable::hardware()),
        Arc::new(MarkerClassifier::new(host)),
        Arc::new(InvocationPool::new(Arc::new(transport))),
    );
    let bridged = interceptor.wrap(device.clone())?;

    let response = bridged.invoke(&method, args).await?;
    let output = serde_json::json!({
        "response": response,
        "state": device.serialize().await?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

// ─── Keyrings ────────────────────────────────────────────────────────────────

async fn cmd_keyrings(socket: Option<PathBuf>) -> Result<(), BridgeError> {
    let transport = UdsTransport::new(socket.unwrap_or_else(default_socket_path));
    let types = transport.list_keyrings().await?;

    if types.is_empty() {
        println!("The foreground hosts no keyrings.");
        return Ok(());
    }

    println!("Foreground keyrings ({}):\n", types.len());
    for keyring_type in &types {
        println!("  {}", keyring_type);
    }

    Ok(())
}

// ─── Policy ──────────────────────────────────────────────────────────────────

fn cmd_policy(keyring: String, method: Option<String>) -> Result<(), BridgeError> {
    let keyring_type = parse_keyring(&keyring)?;
    let table = PolicyTable::hardware();

    match method {
        Some(method) => {
            let policy = table.lookup(keyring_type, &method)?;
            println!("Policy for {}::{}\n", keyring_type, method);
            print_policy(&policy);
        }
        None => {
            let methods = table.overridden_methods(keyring_type)?;
            if methods.is_empty() {
                println!("{} uses the default policy for every method.", keyring_type);
                return Ok(());
            }
            println!("Overridden methods for {} ({}):\n", keyring_type, methods.len());
            for method in &methods {
                let summary = table.lookup(keyring_type, method)?.summary();
                println!(
                    "  {:22} │ skip_background={:5} │ update_all={:5} │ global={}",
                    method, summary.skip_background, summary.update_all, summary.global,
                );
            }
        }
    }

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn parse_keyring(name: &str) -> Result<KeyringType, BridgeError> {
    KeyringType::from_str(name).map_err(BridgeError::Other)
}

fn print_policy(policy: &MethodPolicy) {
    println!("  Skip background:  {}", policy.skip_background);
    println!("  Update all:       {}", policy.update_all);
    println!("  Global:           {}", policy.global);
    println!("  Args transform:   {}", policy.args_transform.name());
    println!("  Result transform: {}", policy.result_transform.name());
    println!("  State sync:       {}", policy.state_sync.name());
}
