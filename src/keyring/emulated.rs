// Keybridge — Emulated Hardware Device
//
// A deterministic stand-in for a hardware-signing driver. Accounts and
// signatures are derived with SHA-256 so both sides of the bridge agree
// on every result. Operations that need device access fail with the
// matching capability marker while the host is in restricted mode, the
// same way a real driver does after its background context is recycled.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::transaction::{SignedTransaction, Transaction};
use super::{Keyring, KeyringError, KeyringType};
use crate::bridge::HostMode;

/// Accounts per enumeration page.
const PAGE_SIZE: usize = 5;

const DEFAULT_HD_PATH: &str = "m/44'/60'/0'/0";

const METHODS: &[&str] = &[
    "init",
    "isUnlocked",
    "getModel",
    "getFirstPage",
    "getNextPage",
    "getPreviousPage",
    "setAccountToUnlock",
    "addAccounts",
    "getAccounts",
    "signTransaction",
    "signMessage",
    "signPersonalMessage",
    "signTypedData",
    "forgetDevice",
    "destroy",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceState {
    hd_path: String,
    page: usize,
    unlocked: bool,
    #[serde(default)]
    account_to_unlock: Option<usize>,
    #[serde(default)]
    accounts: Vec<String>,
}

pub struct EmulatedDevice {
    keyring_type: KeyringType,
    host: Arc<dyn HostMode>,
    state: Mutex<DeviceState>,
}

impl EmulatedDevice {
    pub fn new(keyring_type: KeyringType, host: Arc<dyn HostMode>) -> Self {
        Self {
            keyring_type,
            host,
            state: Mutex::new(DeviceState {
                hd_path: DEFAULT_HD_PATH.to_string(),
                ..DeviceState::default()
            }),
        }
    }

    fn model(&self) -> &'static str {
        match self.keyring_type {
            KeyringType::Trezor => "T",
            KeyringType::OneKey => "OneKey Classic",
            KeyringType::Ledger => "nanoX",
            KeyringType::Lattice => "Lattice1",
            KeyringType::Qr => "QR Hardware",
            KeyringType::HdKeyTree => "software",
        }
    }

    /// The API this device type reaches for when talking to hardware.
    fn device_api(&self) -> &'static str {
        match self.keyring_type {
            KeyringType::Ledger => "navigator.hid is not available in this context",
            KeyringType::Lattice => "window is not defined",
            KeyringType::Qr => "document is not defined",
            _ => "navigator.usb is not available in this context",
        }
    }

    fn require_device(&self, method: &str) -> Result<(), KeyringError> {
        if self.host.is_restricted() {
            return Err(KeyringError::failure(format!(
                "{} failed: device unreachable",
                method
            ))
            .with_cause(self.device_api()));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn derive_address(&self, hd_path: &str, index: usize) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.keyring_type.as_str().as_bytes());
        hasher.update(b"::");
        hasher.update(hd_path.as_bytes());
        hasher.update(index.to_be_bytes());
        let digest = hasher.finalize();
        format!("0x{}", hex::encode(&digest[12..]))
    }

    fn page(&self, method: &str, page: usize) -> Result<Value, KeyringError> {
        let hd_path = self.lock().hd_path.clone();
        let start = page
            .checked_mul(PAGE_SIZE)
            .filter(|start| start.checked_add(PAGE_SIZE).is_some())
            .ok_or_else(|| KeyringError::invalid_args(method, format!("page {} is out of range", page)))?;
        let accounts: Vec<Value> = (start..start + PAGE_SIZE)
            .map(|index| {
                json!({
                    "address": self.derive_address(&hd_path, index),
                    "balance": null,
                    "index": index,
                })
            })
            .collect();
        Ok(Value::Array(accounts))
    }

    fn sign_bytes(&self, address: &str, payload: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let r = Sha256::new()
            .chain_update(self.keyring_type.as_str().as_bytes())
            .chain_update(address.as_bytes())
            .chain_update(payload)
            .finalize()
            .to_vec();
        let s = Sha256::digest(&r).to_vec();
        (r, s)
    }

    fn known_address(&self, method: &str, args: &[Value]) -> Result<String, KeyringError> {
        let address = string_arg(method, args, 0)?;
        let known = self
            .lock()
            .accounts
            .iter()
            .any(|a| a.eq_ignore_ascii_case(&address));
        if !known {
            return Err(KeyringError::failure(format!(
                "Address {} not found in this keyring",
                address
            )));
        }
        Ok(address)
    }

    fn sign_transaction(&self, args: &[Value]) -> Result<Value, KeyringError> {
        const METHOD: &str = "signTransaction";
        let address = self.known_address(METHOD, args)?;
        let tx_value = args
            .get(1)
            .ok_or_else(|| KeyringError::invalid_args(METHOD, "missing transaction"))?;
        let transaction: Transaction = serde_json::from_value(tx_value.clone())
            .map_err(|e| KeyringError::invalid_args(METHOD, e.to_string()))?;
        let encoded = serde_json::to_vec(&transaction)
            .map_err(|e| KeyringError::invalid_args(METHOD, e.to_string()))?;

        let (r, s) = self.sign_bytes(&address, &encoded);
        let signed = SignedTransaction {
            v: transaction.chain_id * 2 + 35,
            transaction,
            r,
            s,
        };
        serde_json::to_value(signed).map_err(|e| KeyringError::invalid_args(METHOD, e.to_string()))
    }

    fn sign_message(&self, method: &str, args: &[Value]) -> Result<Value, KeyringError> {
        let address = self.known_address(method, args)?;
        let payload = args
            .get(1)
            .ok_or_else(|| KeyringError::invalid_args(method, "missing message"))?;
        let (r, s) = self.sign_bytes(&address, payload.to_string().as_bytes());
        Ok(Value::String(format!(
            "0x{}{}1b",
            hex::encode(r),
            hex::encode(s)
        )))
    }
}

#[async_trait]
impl Keyring for EmulatedDevice {
    fn keyring_type(&self) -> KeyringType {
        self.keyring_type
    }

    fn methods(&self) -> Vec<&'static str> {
        METHODS.to_vec()
    }

    async fn serialize(&self) -> Result<Value, KeyringError> {
        serde_json::to_value(&*self.lock())
            .map_err(|e| KeyringError::failure(format!("state serialization failed: {}", e)))
    }

    async fn deserialize(&self, state: Value) -> Result<(), KeyringError> {
        let restored: DeviceState = serde_json::from_value(state)
            .map_err(|e| KeyringError::invalid_args("deserialize", e.to_string()))?;
        *self.lock() = restored;
        Ok(())
    }

    async fn call(&self, method: &str, args: &[Value]) -> Result<Value, KeyringError> {
        match method {
            "init" => {
                self.require_device(method)?;
                self.lock().unlocked = true;
                Ok(Value::Null)
            }
            "isUnlocked" => Ok(Value::Bool(self.lock().unlocked)),
            "getModel" => {
                self.require_device(method)?;
                Ok(Value::String(self.model().to_string()))
            }
            "getFirstPage" => {
                self.require_device(method)?;
                self.lock().page = 0;
                self.page(method, 0)
            }
            "getNextPage" => {
                self.require_device(method)?;
                let page = {
                    let mut state = self.lock();
                    state.page = state.page.checked_add(1).ok_or_else(|| {
                        KeyringError::invalid_args(method, "no page after the last one")
                    })?;
                    state.page
                };
                self.page(method, page)
            }
            "getPreviousPage" => {
                self.require_device(method)?;
                let page = {
                    let mut state = self.lock();
                    if state.page == 0 {
                        return Err(KeyringError::failure("Already on the first page"));
                    }
                    state.page -= 1;
                    state.page
                };
                self.page(method, page)
            }
            "setAccountToUnlock" => {
                let index = args
                    .first()
                    .and_then(Value::as_u64)
                    .ok_or_else(|| KeyringError::invalid_args(method, "expected an index"))?;
                let index = usize::try_from(index)
                    .map_err(|_| KeyringError::invalid_args(method, "index is out of range"))?;
                self.lock().account_to_unlock = Some(index);
                Ok(Value::Null)
            }
            "addAccounts" => {
                self.require_device(method)?;
                let count = args.first().and_then(Value::as_u64).unwrap_or(1);
                if count == 0 || count > PAGE_SIZE as u64 {
                    return Err(KeyringError::invalid_args(
                        method,
                        format!("can add between 1 and {} accounts at a time", PAGE_SIZE),
                    ));
                }
                let (hd_path, from) = {
                    let state = self.lock();
                    (state.hd_path.clone(), state.account_to_unlock.unwrap_or(0))
                };
                let end = from
                    .checked_add(count as usize)
                    .ok_or_else(|| KeyringError::invalid_args(method, "account index is out of range"))?;
                let added: Vec<String> = (from..end)
                    .map(|index| self.derive_address(&hd_path, index))
                    .collect();
                let mut state = self.lock();
                for address in &added {
                    if !state.accounts.contains(address) {
                        state.accounts.push(address.clone());
                    }
                }
                state.account_to_unlock = None;
                Ok(json!(added))
            }
            "getAccounts" => Ok(json!(self.lock().accounts)),
            "signTransaction" => {
                self.require_device(method)?;
                self.sign_transaction(args)
            }
            "signMessage" | "signPersonalMessage" | "signTypedData" => {
                self.require_device(method)?;
                self.sign_message(method, args)
            }
            "forgetDevice" => {
                *self.lock() = DeviceState {
                    hd_path: DEFAULT_HD_PATH.to_string(),
                    ..DeviceState::default()
                };
                Ok(Value::Null)
            }
            "destroy" => Ok(Value::Null),
            other => Err(KeyringError::unsupported(other)),
        }
    }
}

fn string_arg(method: &str, args: &[Value], index: usize) -> Result<String, KeyringError> {
    args.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| KeyringError::invalid_args(method, format!("argument {} must be a string", index)))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
