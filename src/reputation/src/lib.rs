//! Reputation system for the peerscore validator
//!
//! Turns per-round rewards into durable peer reputation and reputation into
//! ledger-legal weights:
//! - **ReputationStore**: EMA-blended scores, zero-extended as the population
//!   grows, persisted with the identity bound to each slot
//! - **VolumeLedger**: deduplicated throughput per epoch group, an alternate
//!   reward source
//! - **WeightProcessor**: quantile exclusion, uniform fallback and a cap on any
//!   single weight
//! - **StateStore**: RocksDB (or in-memory) persistence
//! - **ValidatorMetrics**: Prometheus counters and gauges

pub mod error;
pub mod metrics;
pub mod reputation_store;
pub mod storage;
pub mod types;
pub mod volume_ledger;
pub mod weight_processor;

pub use error::{ReputationError, Result};
pub use metrics::ValidatorMetrics;
pub use reputation_store::{ReputationStatistics, ReputationStore};
pub use storage::{MemoryStateStore, RocksDbStateStore, StateStore};
pub use types::{
    ReputationConfig, ReputationScore, ReputationState, VolumeBucket, VolumeConfig, VolumeState,
    WeightConstraints,
};
pub use volume_ledger::{item_keys, VolumeLedger};
pub use weight_processor::{normalize_max_weight, process_weights, WeightProcessor};
