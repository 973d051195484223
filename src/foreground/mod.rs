// Keybridge — Foreground Module
//
// The persistent side of the bridge: owns full-capability keyring
// drivers and executes bridged calls against them.

mod host;

pub use host::ForegroundHost;
