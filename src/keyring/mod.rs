// Keybridge — Keyring Module
//
// The driver contract every keyring implements, the keyring type
// identifiers, a construct-once registry, and a deterministic hardware
// emulator used by the CLI and the foreground host.

mod emulated;
mod error;
mod registry;
pub mod transaction;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use emulated::EmulatedDevice;
pub use error::KeyringError;
pub use registry::KeyringRegistry;

// ─── Keyring Types ───────────────────────────────────────────────────────────

/// Class of signing driver. The serialized form is the driver's display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyringType {
    #[serde(rename = "Trezor Hardware")]
    Trezor,
    #[serde(rename = "OneKey Hardware")]
    OneKey,
    #[serde(rename = "Ledger Hardware")]
    Ledger,
    #[serde(rename = "Lattice Hardware")]
    Lattice,
    #[serde(rename = "QR Hardware Wallet Device")]
    Qr,
    #[serde(rename = "HD Key Tree")]
    HdKeyTree,
}

impl KeyringType {
    /// All hardware-signing driver types.
    pub const HARDWARE: [KeyringType; 5] = [
        KeyringType::Trezor,
        KeyringType::OneKey,
        KeyringType::Ledger,
        KeyringType::Lattice,
        KeyringType::Qr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyringType::Trezor => "Trezor Hardware",
            KeyringType::OneKey => "OneKey Hardware",
            KeyringType::Ledger => "Ledger Hardware",
            KeyringType::Lattice => "Lattice Hardware",
            KeyringType::Qr => "QR Hardware Wallet Device",
            KeyringType::HdKeyTree => "HD Key Tree",
        }
    }

    pub fn is_hardware(&self) -> bool {
        Self::HARDWARE.contains(self)
    }
}

impl fmt::Display for KeyringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyringType {
    type Err = String;

    /// Accepts either the display name or a short alias (`ledger`, `qr`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = [
            KeyringType::Trezor,
            KeyringType::OneKey,
            KeyringType::Ledger,
            KeyringType::Lattice,
            KeyringType::Qr,
            KeyringType::HdKeyTree,
        ];
        if let Some(t) = all.iter().find(|t| t.as_str() == s) {
            return Ok(*t);
        }
        match s.to_ascii_lowercase().as_str() {
            "trezor" => Ok(KeyringType::Trezor),
            "onekey" => Ok(KeyringType::OneKey),
            "ledger" => Ok(KeyringType::Ledger),
            "lattice" => Ok(KeyringType::Lattice),
            "qr" => Ok(KeyringType::Qr),
            "hd" | "hd-key-tree" => Ok(KeyringType::HdKeyTree),
            _ => Err(format!("unknown keyring type: {}", s)),
        }
    }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A live keyring driver.
///
/// Drivers hold their own state behind interior mutability; the bridge only
/// reads it through `serialize` and writes it through `deserialize`.
/// Named operations are opaque: arguments and results are JSON values.
#[async_trait]
pub trait Keyring: Send + Sync {
    fn keyring_type(&self) -> KeyringType;

    /// Names of the operations this driver exposes through `call`.
    fn methods(&self) -> Vec<&'static str>;

    async fn serialize(&self) -> Result<Value, KeyringError>;

    async fn deserialize(&self, state: Value) -> Result<(), KeyringError>;

    async fn call(&self, method: &str, args: &[Value]) -> Result<Value, KeyringError>;
}

// ─── In-Memory Mock for Testing ──────────────────────────────────────────────


// ─── Tests ───────────────────────────────────────────────────────────────────
