//! Validator configuration loading and validation

use crate::backoff::BackoffConfig;
use anyhow::{Context, Result};
use peerscore_consensus::{ConsensusConfig, ScoringConfig, ScoringMode};
use peerscore_core::Query;
use peerscore_network::LivenessConfig;
use peerscore_reputation::{ReputationConfig, VolumeConfig, WeightConstraints};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Complete validator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidatorConfig {
    #[serde(default)]
    pub node: NodeSection,

    #[serde(default)]
    pub network: NetworkSection,

    #[serde(default)]
    pub consensus: ConsensusConfig,

    #[serde(default)]
    pub scoring: ScoringSection,

    #[serde(default)]
    pub reputation: ReputationConfig,

    #[serde(default)]
    pub weights: WeightConstraints,

    #[serde(default)]
    pub schedule: ScheduleSection,

    #[serde(default)]
    pub volume: VolumeConfig,

    #[serde(default)]
    pub ledger: LedgerSection,

    #[serde(default)]
    pub emission: BackoffConfig,

    #[serde(default)]
    pub oracle: OracleSection,

    /// Queries issued in rotation, one per query round
    #[serde(default = "default_queries")]
    pub queries: Vec<Query>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeSection {
    pub id: String,
    pub data_dir: PathBuf,
    pub log_level: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: "validator-0".to_string(),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkSection {
    /// Peers sampled per query round
    pub sample_size: usize,
    pub query_timeout_ms: u64,
    pub ping_timeout_ms: u64,
    /// Consecutive failed pings before a peer is unreachable
    pub dead_after: u32,
    /// Minimum protocol version a peer must report
    pub required_version: u32,
    pub max_reply_bytes: usize,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            sample_size: 16,
            query_timeout_ms: 10_000,
            ping_timeout_ms: 5_000,
            dead_after: 3,
            required_version: 0,
            max_reply_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Where rewards for the reputation vector come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardSource {
    /// Correctness of responses against the source of truth
    #[default]
    Content,
    /// Distinct items served, from the volume ledger
    Volume,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringSection {
    pub field_penalty: f64,
    pub mode: ScoringMode,
    pub cluster_count: usize,
    pub reward_source: RewardSource,
}

impl Default for ScoringSection {
    fn default() -> Self {
        let scoring = ScoringConfig::default();
        Self {
            field_penalty: scoring.field_penalty,
            mode: scoring.mode,
            cluster_count: scoring.cluster_count,
            reward_source: RewardSource::Content,
        }
    }
}

/// Task cadences in height units
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub sync_interval: u64,
    pub ping_interval: u64,
    pub query_interval: u64,
    pub weights_interval: u64,
    /// Wall-clock polling period of every task
    pub tick_ms: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            sync_interval: 100,
            ping_interval: 10,
            query_interval: 1,
            weights_interval: 100,
            tick_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerSection {
    /// JSON array of peers served as the population snapshot
    pub peers_file: PathBuf,
    /// JSON-lines file receiving emitted weight sets
    pub weights_file: PathBuf,
    pub block_time_ms: u64,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            peers_file: PathBuf::from("peers.json"),
            weights_file: PathBuf::from("weights.jsonl"),
            block_time_ms: 12_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleSection {
    /// Oracle address; empty disables the oracle
    pub address: String,
    pub timeout_ms: u64,
}

fn default_queries() -> Vec<Query> {
    vec![Query::new("profile", serde_json::json!({}))]
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            node: NodeSection::default(),
            network: NetworkSection::default(),
            consensus: ConsensusConfig::default(),
            scoring: ScoringSection::default(),
            reputation: ReputationConfig::default(),
            weights: WeightConstraints::default(),
            schedule: ScheduleSection::default(),
            volume: VolumeConfig::default(),
            ledger: LedgerSection::default(),
            emission: BackoffConfig::default(),
            oracle: OracleSection::default(),
            queries: default_queries(),
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read configuration file {:?}", path.as_ref()))?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse configuration file")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.network.sample_size == 0 {
            anyhow::bail!("network.sample_size must be positive");
        }
        if self.network.query_timeout_ms == 0 || self.network.ping_timeout_ms == 0 {
            anyhow::bail!("network timeouts must be positive");
        }
        if self.queries.is_empty() {
            anyhow::bail!("at least one [[queries]] entry is required");
        }
        if self.schedule.tick_ms == 0 {
            anyhow::bail!("schedule.tick_ms must be positive");
        }
        if self.ledger.block_time_ms == 0 {
            anyhow::bail!("ledger.block_time_ms must be positive");
        }
        if self.emission.multiplier < 1.0 {
            anyhow::bail!("emission.multiplier must be at least 1.0");
        }

        self.consensus.validate().context("Invalid [consensus] section")?;
        self.scoring_config().validate().context("Invalid [scoring] section")?;
        self.reputation.validate().context("Invalid [reputation] section")?;
        self.weights.validate().context("Invalid [weights] section")?;
        if !self.weights.cap_always_feasible() {
            warn!(
                "weights.max_weight_limit {} cannot be met by {} peers; small populations get uniform weights above the cap",
                self.weights.max_weight_limit, self.weights.min_allowed_non_zero
            );
        }
        self.volume.validate().context("Invalid [volume] section")?;
        Ok(())
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            field_penalty: self.scoring.field_penalty,
            mode: self.scoring.mode,
            cluster_count: self.scoring.cluster_count,
        }
    }

    /// Reputation config sharing the consensus trust threshold
    pub fn reputation_config(&self) -> ReputationConfig {
        ReputationConfig {
            trust_threshold: self.consensus.trust_threshold,
            ..self.reputation.clone()
        }
    }

    pub fn liveness_config(&self) -> LivenessConfig {
        LivenessConfig {
            ping_timeout: Duration::from_millis(self.network.ping_timeout_ms),
            dead_after: self.network.dead_after.max(1),
        }
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.network.query_timeout_ms)
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle.timeout_ms.max(1))
    }

    /// Absolute data directory path
    pub fn data_dir(&self) -> PathBuf {
        if self.node.data_dir.is_absolute() {
            self.node.data_dir.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.node.data_dir)
        }
    }

    /// RocksDB state directory
    pub fn state_path(&self) -> PathBuf {
        self.data_dir().join("state")
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }

    pub fn peers_file(&self) -> PathBuf {
        self.resolve(&self.ledger.peers_file)
    }

    pub fn weights_file(&self) -> PathBuf {
        self.resolve(&self.ledger.weights_file)
    }
}
