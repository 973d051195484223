// Keybridge — Transaction Codec
//
// Rich transactions carry raw byte fields, which the bridge's JSON
// transport cannot carry faithfully. The transport form replaces every
// byte field with a 0x-prefixed hex string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::KeyringError;

const SIGN_TRANSACTION: &str = "signTransaction";

// ─── Rich Form ───────────────────────────────────────────────────────────────

/// An unsigned transaction as a local driver consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "type")]
    pub tx_type: u8,
    pub chain_id: u64,
    pub nonce: u64,
    pub to: String,
    pub value: String,
    pub gas_limit: u64,
    pub data: Vec<u8>,
}

/// A signed transaction as a local driver produces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub v: u64,
    pub r: Vec<u8>,
    pub s: Vec<u8>,
}

// ─── Transport Form ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportTransaction {
    #[serde(rename = "type")]
    pub tx_type: u8,
    pub chain_id: u64,
    pub nonce: u64,
    pub to: String,
    pub value: String,
    pub gas_limit: u64,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSignedTransaction {
    #[serde(flatten)]
    pub transaction: TransportTransaction,
    pub v: u64,
    pub r: String,
    pub s: String,
}

impl Transaction {
    pub fn to_transport(&self) -> TransportTransaction {
        TransportTransaction {
            tx_type: self.tx_type,
            chain_id: self.chain_id,
            nonce: self.nonce,
            to: self.to.clone(),
            value: self.value.clone(),
            gas_limit: self.gas_limit,
            data: to_hex(&self.data),
        }
    }
}

impl TransportTransaction {
    pub fn into_rich(self) -> Result<Transaction, KeyringError> {
        Ok(Transaction {
            tx_type: self.tx_type,
            chain_id: self.chain_id,
            nonce: self.nonce,
            to: self.to,
            value: self.value,
            gas_limit: self.gas_limit,
            data: from_hex(&self.data)?,
        })
    }
}

impl SignedTransaction {
    pub fn to_transport(&self) -> TransportSignedTransaction {
        TransportSignedTransaction {
            transaction: self.transaction.to_transport(),
            v: self.v,
            r: to_hex(&self.r),
            s: to_hex(&self.s),
        }
    }
}

impl TransportSignedTransaction {
    pub fn into_rich(self) -> Result<SignedTransaction, KeyringError> {
        Ok(SignedTransaction {
            transaction: self.transaction.into_rich()?,
            v: self.v,
            r: from_hex(&self.r)?,
            s: from_hex(&self.s)?,
        })
    }
}

// ─── Value-Level Codec ───────────────────────────────────────────────────────

pub fn encode_unsigned(value: &Value) -> Result<Value, KeyringError> {
    let tx: Transaction = parse(value)?;
    render(&tx.to_transport())
}

pub fn decode_unsigned(value: &Value) -> Result<Value, KeyringError> {
    let tx: TransportTransaction = parse(value)?;
    render(&tx.into_rich()?)
}

pub fn encode_signed(value: &Value) -> Result<Value, KeyringError> {
    let tx: SignedTransaction = parse(value)?;
    render(&tx.to_transport())
}

pub fn decode_signed(value: &Value) -> Result<Value, KeyringError> {
    let tx: TransportSignedTransaction = parse(value)?;
    render(&tx.into_rich()?)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn from_hex(text: &str) -> Result<Vec<u8>, KeyringError> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(digits).map_err(|e| {
        KeyringError::invalid_args(SIGN_TRANSACTION, format!("bad hex field: {}", e))
    })
}

fn parse<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, KeyringError> {
    serde_json::from_value(value.clone())
        .map_err(|e| KeyringError::invalid_args(SIGN_TRANSACTION, e.to_string()))
}

fn render<T: Serialize>(value: &T) -> Result<Value, KeyringError> {
    serde_json::to_value(value)
        .map_err(|e| KeyringError::invalid_args(SIGN_TRANSACTION, e.to_string()))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
