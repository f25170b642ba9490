//! Prometheus metrics for the validator
//!
//! All metrics live in a registry owned by [`ValidatorMetrics`], so several
//! validators (or tests) in one process never collide on registration.

use crate::error::Result;
use crate::reputation_store::ReputationStatistics;
use prometheus::{
    register_gauge_with_registry, register_histogram_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Gauge,
    Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Histogram buckets for per-response rewards (0.0 to 1.0)
const REWARD_BUCKETS: &[f64] = &[0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

/// Validator metrics collection
pub struct ValidatorMetrics {
    registry: Registry,

    /// Completed query rounds
    pub query_rounds_total: IntCounter,

    /// Rounds whose source of truth came from the oracle
    pub oracle_fallbacks_total: IntCounter,

    /// Rounds that ended without a source of truth
    pub no_source_rounds_total: IntCounter,

    /// Sampled peers without a usable response
    pub absent_responses_total: IntCounter,

    /// Distribution of per-response rewards
    pub reward_distribution: Histogram,

    pub score_mean: Gauge,
    pub score_highest: Gauge,
    pub score_lowest: Gauge,

    /// Peers above the trust threshold
    pub trusted_peers: IntGauge,

    /// Peers in the reputation vector
    pub tracked_peers: IntGauge,

    pub weight_emissions_total: IntCounter,
    pub weight_emission_failures_total: IntCounter,

    /// Reputation updates that could not be persisted
    pub persistence_failures_total: IntCounter,
}

impl ValidatorMetrics {
    /// Create metrics in a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Registry::new_custom(Some("peerscore".to_string()), None)?)
    }

    /// Create metrics registered in `registry`
    pub fn with_registry(registry: Registry) -> Result<Self> {
        Ok(Self {
            query_rounds_total: register_int_counter_with_registry!(
                Opts::new("query_rounds_total", "Completed query rounds"),
                registry
            )?,
            oracle_fallbacks_total: register_int_counter_with_registry!(
                Opts::new("oracle_fallbacks_total", "Rounds decided by the authoritative oracle"),
                registry
            )?,
            no_source_rounds_total: register_int_counter_with_registry!(
                Opts::new("no_source_rounds_total", "Rounds without a source of truth"),
                registry
            )?,
            absent_responses_total: register_int_counter_with_registry!(
                Opts::new("absent_responses_total", "Sampled peers without a usable response"),
                registry
            )?,
            reward_distribution: register_histogram_with_registry!(
                HistogramOpts::new("reward_distribution", "Per-response rewards")
                    .buckets(REWARD_BUCKETS.to_vec()),
                registry
            )?,
            score_mean: register_gauge_with_registry!(
                Opts::new("score_mean", "Mean reputation score"),
                registry
            )?,
            score_highest: register_gauge_with_registry!(
                Opts::new("score_highest", "Highest reputation score"),
                registry
            )?,
            score_lowest: register_gauge_with_registry!(
                Opts::new("score_lowest", "Lowest reputation score"),
                registry
            )?,
            trusted_peers: register_int_gauge_with_registry!(
                Opts::new("trusted_peers", "Peers above the trust threshold"),
                registry
            )?,
            tracked_peers: register_int_gauge_with_registry!(
                Opts::new("tracked_peers", "Peers in the reputation vector"),
                registry
            )?,
            weight_emissions_total: register_int_counter_with_registry!(
                Opts::new("weight_emissions_total", "Weight sets accepted by the ledger"),
                registry
            )?,
            weight_emission_failures_total: register_int_counter_with_registry!(
                Opts::new("weight_emission_failures_total", "Weight emissions given up after retries"),
                registry
            )?,
            persistence_failures_total: register_int_counter_with_registry!(
                Opts::new("persistence_failures_total", "Reputation updates not persisted"),
                registry
            )?,
            registry,
        })
    }

    /// Record a finished query round
    pub fn record_round<'a>(
        &self,
        used_oracle: bool,
        had_source: bool,
        absent: usize,
        rewards: impl IntoIterator<Item = &'a f64>,
    ) {
        self.query_rounds_total.inc();
        if used_oracle {
            self.oracle_fallbacks_total.inc();
        }
        if !had_source {
            self.no_source_rounds_total.inc();
        }
        self.absent_responses_total.inc_by(absent as u64);
        for reward in rewards {
            self.reward_distribution.observe(*reward);
        }
    }

    /// Refresh score gauges
    pub fn update_scores(&self, stats: &ReputationStatistics) {
        self.score_mean.set(stats.average_score);
        self.score_highest.set(stats.highest_score);
        self.score_lowest.set(stats.lowest_score);
        self.trusted_peers.set(stats.trusted_peers as i64);
        self.tracked_peers.set(stats.total_peers as i64);
    }

    /// Record the outcome of a weight emission
    pub fn record_emission(&self, success: bool) {
        if success {
            self.weight_emissions_total.inc();
        } else {
            self.weight_emission_failures_total.inc();
        }
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures_total.inc();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every metric
    pub fn gather_text(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
