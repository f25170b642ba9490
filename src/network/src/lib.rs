//! # peerscore network
//!
//! Everything that touches the peer population:
//!
//! - **Registry**: slot-indexed peer metadata, grown and reconciled from ledger snapshots
//! - **Sampler**: bounded candidate selection with full-coverage cycles
//! - **Dispatcher**: concurrent query fan-out with per-call timeouts
//! - **Liveness**: ping pass that maintains reachability and reported versions
//! - **TCP transport**: a plain newline-delimited JSON [`PeerTransport`](peerscore_core::PeerTransport)

pub mod dispatcher;
pub mod error;
pub mod liveness;
pub mod registry;
pub mod sampler;
pub mod tcp_transport;

pub use dispatcher::{AbsentReason, CallOutcome, Dispatcher};
pub use error::{NetworkError, Result};
pub use liveness::{HealthStatus, LivenessConfig, LivenessProber, LivenessReport, QualityMetrics};
pub use registry::{PeerRegistry, SyncReport};
pub use sampler::PeerSampler;
pub use tcp_transport::{TcpTransport, TcpTransportConfig};
