//! peerscore validator node
//!
//! Wires the network, consensus and reputation crates into a running
//! validator: configuration, the round scheduler, ledger emission with
//! backoff, and the read-only status surface.

pub mod backoff;
pub mod config;
pub mod ledger;
pub mod oracle;
pub mod scheduler;
pub mod status;
pub mod validator;

pub use backoff::{BackoffConfig, BackoffState};
pub use config::{RewardSource, ValidatorConfig};
pub use ledger::{EmissionRecord, FileLedger};
pub use oracle::TransportOracle;
pub use scheduler::{HeightGate, RoundScheduler};
pub use status::StatusHandle;
pub use validator::{EmissionOutcome, RoundSummary, Validator};
