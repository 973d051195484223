// Keybridge — Method Policy Table
//
// Lookup overlays a per-type, per-method override on the default policy.
// Every registered type resolves every method; only an unregistered type
// is an error.

use std::collections::HashMap;

use super::{
    DecodeSignedTransaction, EncodeTransactionArgs, MethodPolicy, PolicyError, PolicyOverride,
};
use crate::keyring::KeyringType;

const PAGE_METHODS: &[&str] = &["getFirstPage", "getNextPage", "getPreviousPage"];
const MESSAGE_SIGNING: &[&str] = &["signMessage", "signPersonalMessage", "signTypedData"];
const TEARDOWN: &[&str] = &["forgetDevice", "destroy"];

#[derive(Clone, Default)]
pub struct PolicyTable {
    entries: HashMap<KeyringType, HashMap<String, PolicyOverride>>,
}

impl PolicyTable {
    /// An empty table with no registered types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type whose methods all use the default policy unless overridden.
    pub fn register(mut self, keyring_type: KeyringType) -> Self {
        self.entries.entry(keyring_type).or_default();
        self
    }

    /// Register (if needed) and set the override for one method.
    pub fn with_override(
        mut self,
        keyring_type: KeyringType,
        method: &str,
        policy: PolicyOverride,
    ) -> Self {
        self.entries
            .entry(keyring_type)
            .or_default()
            .insert(method.to_string(), policy);
        self
    }

    fn with_overrides(
        self,
        keyring_type: KeyringType,
        methods: &[&str],
        policy: PolicyOverride,
    ) -> Self {
        methods.iter().fold(self, |table, method| {
            table.with_override(keyring_type, method, policy.clone())
        })
    }

    pub fn lookup(
        &self,
        keyring_type: KeyringType,
        method: &str,
    ) -> Result<MethodPolicy, PolicyError> {
        let methods = self
            .entries
            .get(&keyring_type)
            .ok_or(PolicyError::UnknownKeyringType(keyring_type))?;

        let policy = match methods.get(method) {
            Some(o) => o.apply(MethodPolicy::default()),
            None => MethodPolicy::default(),
        };
        Ok(policy)
    }

    pub fn ensure_registered(&self, keyring_type: KeyringType) -> Result<(), PolicyError> {
        if self.entries.contains_key(&keyring_type) {
            Ok(())
        } else {
            Err(PolicyError::UnknownKeyringType(keyring_type))
        }
    }

    /// Methods with an explicit override for `keyring_type`, sorted.
    pub fn overridden_methods(&self, keyring_type: KeyringType) -> Result<Vec<String>, PolicyError> {
        let methods = self
            .entries
            .get(&keyring_type)
            .ok_or(PolicyError::UnknownKeyringType(keyring_type))?;
        let mut names: Vec<String> = methods.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// The built-in policies for every hardware keyring type.
    ///
    /// USB-backed drivers (Trezor, OneKey) lose device access entirely in a
    /// recycled background, so their device calls always run in the
    /// foreground. Ledger tries locally first. Lattice pairs through a
    /// foreground window. QR needs no special routing.
    pub fn hardware() -> Self {
        let sign_tx = || {
            PolicyOverride::new()
                .args_transform(EncodeTransactionArgs)
                .result_transform(DecodeSignedTransaction)
        };
        let teardown = PolicyOverride::new().update_all().global();
        let init = PolicyOverride::new().update_all();
        let skip = PolicyOverride::new().skip_background();

        let mut table = Self::new();
        for usb in [KeyringType::Trezor, KeyringType::OneKey] {
            table = table
                .with_override(usb, "init", init.clone())
                .with_override(usb, "getModel", skip.clone())
                .with_overrides(usb, PAGE_METHODS, skip.clone())
                .with_overrides(usb, MESSAGE_SIGNING, skip.clone())
                .with_override(usb, "signTransaction", sign_tx().skip_background())
                .with_overrides(usb, TEARDOWN, teardown.clone());
        }

        table
            .with_override(KeyringType::Ledger, "init", init)
            .with_override(KeyringType::Ledger, "signTransaction", sign_tx())
            .with_overrides(KeyringType::Ledger, TEARDOWN, teardown)
            .with_overrides(KeyringType::Lattice, PAGE_METHODS, skip)
            .with_override(
                KeyringType::Lattice,
                "signTransaction",
                sign_tx().skip_background(),
            )
            .register(KeyringType::Qr)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn is_default(policy: &MethodPolicy) -> bool {
        !policy.skip_background
            && !policy.update_all
            && !policy.global
            && policy.args_transform.name() == "identity"
            && policy.result_transform.name() == "identity"
            && policy.state_sync.name() == "deserialize"
    }

    #[test]
    fn test_unlisted_methods_resolve_to_defaults() {
        let table = PolicyTable::hardware();
        for keyring_type in KeyringType::HARDWARE {
            for method in ["getAccounts", "isUnlocked", "setHdPath", "anythingElse"] {
                let policy = table.lookup(keyring_type, method).unwrap();
                assert!(is_default(&policy), "{} {} should be default", keyring_type, method);
            }
        }
    }

    #[test]
    fn test_qr_has_only_defaults() {
        let table = PolicyTable::hardware();
        assert!(table.overridden_methods(KeyringType::Qr).unwrap().is_empty());
        assert!(is_default(&table.lookup(KeyringType::Qr, "signTransaction").unwrap()));
    }

    #[test]
    fn test_unknown_type_is_configuration_error() {
        let table = PolicyTable::hardware();
        let err = table.lookup(KeyringType::HdKeyTree, "signTransaction").unwrap_err();
        assert_eq!(err, PolicyError::UnknownKeyringType(KeyringType::HdKeyTree));
        assert!(table.ensure_registered(KeyringType::HdKeyTree).is_err());
    }

    #[test]
    fn test_trezor_pages_skip_background() {
        let table = PolicyTable::hardware();
        for method in PAGE_METHODS {
            assert!(table.lookup(KeyringType::Trezor, method).unwrap().skip_background);
        }
        assert!(table.lookup(KeyringType::OneKey, "getModel").unwrap().skip_background);
    }

    #[test]
    fn test_signing_uses_transaction_transforms() {
        let table = PolicyTable::hardware();
        for keyring_type in [KeyringType::Trezor, KeyringType::Ledger, KeyringType::Lattice] {
            let policy = table.lookup(keyring_type, "signTransaction").unwrap();
            assert_eq!(policy.args_transform.name(), "encode-transaction");
            assert_eq!(policy.result_transform.name(), "decode-signed-transaction");
        }
        // Ledger signs locally first.
        assert!(!table.lookup(KeyringType::Ledger, "signTransaction").unwrap().skip_background);
    }

    #[test]
    fn test_teardown_is_global_and_updates_all() {
        let table = PolicyTable::hardware();
        let policy = table.lookup(KeyringType::Ledger, "destroy").unwrap();
        assert!(policy.global);
        assert!(policy.update_all);
        assert!(!policy.skip_background);
    }

    #[test]
    fn test_override_keeps_unset_fields_default() {
        let table = PolicyTable::new().with_override(
            KeyringType::Qr,
            "scan",
            PolicyOverride::new().global(),
        );
        let policy = table.lookup(KeyringType::Qr, "scan").unwrap();
        assert!(policy.global);
        assert!(!policy.skip_background);
        assert_eq!(policy.args_transform.name(), "identity");
    }
}
