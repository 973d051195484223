// Keybridge — Policy Transforms
//
// Hooks a method policy uses to reshape arguments before they cross the
// bridge, reshape the response on the way back, and fold the returned
// driver state into the live keyring. Each transform also carries the
// inverse step the foreground applies on its side of the bridge.

use async_trait::async_trait;
use serde_json::Value;

use crate::keyring::transaction;
use crate::keyring::{Keyring, KeyringError};

// ─── Traits ──────────────────────────────────────────────────────────────────

pub trait ArgsTransform: Send + Sync {
    fn name(&self) -> &'static str;

    fn transform(
        &self,
        args: &[Value],
        keyring: &dyn Keyring,
        method: &str,
    ) -> Result<Vec<Value>, KeyringError>;

    /// Foreground side: turn transported arguments back into what the
    /// driver expects.
    fn restore(&self, args: &[Value], _method: &str) -> Result<Vec<Value>, KeyringError> {
        Ok(args.to_vec())
    }
}

#[async_trait]
pub trait ResultTransform: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transform(
        &self,
        response: Value,
        original_args: &[Value],
        keyring: &dyn Keyring,
        method: &str,
    ) -> Result<Value, KeyringError>;

    /// Foreground side: make the driver's response transport-safe.
    fn prepare(&self, response: Value, _method: &str) -> Result<Value, KeyringError> {
        Ok(response)
    }
}

#[async_trait]
pub trait StateSync: Send + Sync {
    fn name(&self) -> &'static str;

    async fn sync(&self, keyring: &dyn Keyring, state: Value) -> Result<(), KeyringError>;
}

// ─── Defaults ────────────────────────────────────────────────────────────────

/// Passes arguments and responses through untouched.
pub struct Identity;

impl ArgsTransform for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn transform(
        &self,
        args: &[Value],
        _keyring: &dyn Keyring,
        _method: &str,
    ) -> Result<Vec<Value>, KeyringError> {
        Ok(args.to_vec())
    }
}

#[async_trait]
impl ResultTransform for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    async fn transform(
        &self,
        response: Value,
        _original_args: &[Value],
        _keyring: &dyn Keyring,
        _method: &str,
    ) -> Result<Value, KeyringError> {
        Ok(response)
    }
}

/// Replaces the live driver's state with the foreground's.
pub struct DeserializeInPlace;

#[async_trait]
impl StateSync for DeserializeInPlace {
    fn name(&self) -> &'static str {
        "deserialize"
    }

    async fn sync(&self, keyring: &dyn Keyring, state: Value) -> Result<(), KeyringError> {
        keyring.deserialize(state).await
    }
}

// ─── Transaction Signing ─────────────────────────────────────────────────────

/// `signTransaction(address, tx)`: hex-encodes the transaction's byte fields.
pub struct EncodeTransactionArgs;

impl ArgsTransform for EncodeTransactionArgs {
    fn name(&self) -> &'static str {
        "encode-transaction"
    }

    fn transform(
        &self,
        args: &[Value],
        _keyring: &dyn Keyring,
        method: &str,
    ) -> Result<Vec<Value>, KeyringError> {
        let [address, tx, rest @ ..] = args else {
            return Err(KeyringError::invalid_args(
                method,
                "expected (address, transaction)",
            ));
        };
        let mut out = Vec::with_capacity(args.len());
        out.push(address.clone());
        out.push(transaction::encode_unsigned(tx)?);
        out.extend(rest.iter().cloned());
        Ok(out)
    }

    fn restore(&self, args: &[Value], method: &str) -> Result<Vec<Value>, KeyringError> {
        let [address, tx, rest @ ..] = args else {
            return Err(KeyringError::invalid_args(
                method,
                "expected (address, transaction)",
            ));
        };
        let mut out = Vec::with_capacity(args.len());
        out.push(address.clone());
        out.push(transaction::decode_unsigned(tx)?);
        out.extend(rest.iter().cloned());
        Ok(out)
    }
}

/// Rebuilds the rich signed transaction from its transport form.
pub struct DecodeSignedTransaction;

#[async_trait]
impl ResultTransform for DecodeSignedTransaction {
    fn name(&self) -> &'static str {
        "decode-signed-transaction"
    }

    async fn transform(
        &self,
        response: Value,
        _original_args: &[Value],
        _keyring: &dyn Keyring,
        _method: &str,
    ) -> Result<Value, KeyringError> {
        transaction::decode_signed(&response)
    }

    fn prepare(&self, response: Value, _method: &str) -> Result<Value, KeyringError> {
        transaction::encode_signed(&response)
    }
}

// ─── Closure Adapters ────────────────────────────────────────────────────────

/// Wraps a plain function as an [`ArgsTransform`].
pub struct MapArgs<F>(pub &'static str, pub F);

impl<F> ArgsTransform for MapArgs<F>
where
    F: Fn(&[Value]) -> Result<Vec<Value>, KeyringError> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.0
    }

    fn transform(
        &self,
        args: &[Value],
        _keyring: &dyn Keyring,
        _method: &str,
    ) -> Result<Vec<Value>, KeyringError> {
        (self.1)(args)
    }
}

/// Wraps a plain function as a [`ResultTransform`].
pub struct MapResult<F>(pub &'static str, pub F);

#[async_trait]
impl<F> ResultTransform for MapResult<F>
where
    F: Fn(Value, &[Value]) -> Result<Value, KeyringError> + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.0
    }

    async fn transform(
        &self,
        response: Value,
        original_args: &[Value],
        _keyring: &dyn Keyring,
        _method: &str,
    ) -> Result<Value, KeyringError> {
        (self.1)(response, original_args)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
