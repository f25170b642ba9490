//! Validator round wiring
//!
//! Owns every subsystem and exposes one method per scheduled round. Rounds
//! share state only through the registry, the reputation store and the
//! volume ledger, each of which serializes its own writers.

use crate::backoff::BackoffState;
use crate::config::{RewardSource, ValidatorConfig};
use crate::status::StatusHandle;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use peerscore_consensus::{ConsensusEngine, Decision, ScoringEngine};
use peerscore_core::{AuthoritativeFetch, Ledger, PeerId, PeerTransport, Query, QueryRound, WeightSet};
use peerscore_network::{
    Dispatcher, LivenessProber, LivenessReport, NetworkError, PeerRegistry, PeerSampler, SyncReport,
};
use peerscore_reputation::{
    item_keys, ReputationStore, StateStore, ValidatorMetrics, VolumeLedger, WeightProcessor,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Summary of a finished query round
#[derive(Debug, Clone)]
pub struct RoundSummary {
    pub round_id: Uuid,
    pub query: Query,
    pub decision: Decision,
    pub rewards: HashMap<PeerId, f64>,
    pub absent: usize,
}

/// Outcome of a weights round
#[derive(Debug, Clone, PartialEq)]
pub enum EmissionOutcome {
    /// The ledger accepted the weight set
    Emitted { peers: usize, attempts: u32 },
    /// Every attempt failed; the next weights round tries again
    Failed { attempts: u32 },
    /// Shutdown interrupted the retries
    Cancelled,
    /// No known peers, nothing to emit
    Skipped,
}

/// A validator instance and its shared state
pub struct Validator {
    config: ValidatorConfig,
    ledger: Arc<dyn Ledger>,
    oracle: Arc<dyn AuthoritativeFetch>,
    state_store: Arc<dyn StateStore>,
    registry: Arc<PeerRegistry>,
    sampler: PeerSampler,
    dispatcher: Dispatcher,
    prober: LivenessProber,
    consensus: ConsensusEngine,
    scoring: ScoringEngine,
    reputation: Arc<ReputationStore>,
    volumes: Arc<VolumeLedger>,
    weights: WeightProcessor,
    latest_weights: Arc<RwLock<Option<WeightSet>>>,
    metrics: Arc<ValidatorMetrics>,
    query_cursor: AtomicUsize,
}

impl Validator {
    /// Build a validator over its collaborators
    ///
    /// Persisted scores are reconciled with the live population on the first
    /// sync round.
    pub fn new(
        config: ValidatorConfig,
        ledger: Arc<dyn Ledger>,
        transport: Arc<dyn PeerTransport>,
        oracle: Arc<dyn AuthoritativeFetch>,
        state_store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(PeerRegistry::new());
        let sampler = PeerSampler::new(registry.clone(), config.network.required_version);
        let dispatcher = Dispatcher::new(transport.clone(), registry.clone());
        let prober = LivenessProber::new(config.liveness_config(), transport, registry.clone());

        let consensus = ConsensusEngine::new(config.consensus.clone())
            .context("Failed to create consensus engine")?;
        let scoring =
            ScoringEngine::new(config.scoring_config()).context("Failed to create scoring engine")?;

        let (reputation, _) =
            ReputationStore::open(config.reputation_config(), state_store.clone(), &[])
                .context("Failed to open reputation store")?;

        let volume_state = match state_store.load_volumes() {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!("Persisted volumes unreadable, starting empty: {}", e);
                Default::default()
            }
        };
        let volumes = VolumeLedger::from_state(config.volume.clone(), volume_state);

        let metrics = ValidatorMetrics::new().context("Failed to register metrics")?;
        metrics.update_scores(&reputation.statistics());

        info!(
            "Validator {} ready: {} persisted scores, reward source {:?}",
            config.node.id,
            reputation.len(),
            config.scoring.reward_source
        );

        Ok(Self {
            weights: WeightProcessor::new(config.weights.clone()),
            config,
            ledger,
            oracle,
            state_store,
            registry,
            sampler,
            dispatcher,
            prober,
            consensus,
            scoring,
            reputation: Arc::new(reputation),
            volumes: Arc::new(volumes),
            latest_weights: Arc::new(RwLock::new(None)),
            metrics: Arc::new(metrics),
            query_cursor: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    pub fn reputation(&self) -> &Arc<ReputationStore> {
        &self.reputation
    }

    pub fn volumes(&self) -> &Arc<VolumeLedger> {
        &self.volumes
    }

    pub fn sampler(&self) -> &PeerSampler {
        &self.sampler
    }

    /// Read-only view of scores, weights and volumes
    pub fn status(&self) -> StatusHandle {
        StatusHandle::new(
            self.reputation.clone(),
            self.volumes.clone(),
            self.latest_weights.clone(),
            self.metrics.clone(),
        )
    }

    /// Current ledger height
    pub async fn current_height(&self) -> Result<u64> {
        self.ledger
            .current_height()
            .await
            .context("Failed to read ledger height")
    }

    /// Refresh the registry from the ledger and reset replaced peers
    pub async fn sync_round(&self) -> Result<SyncReport> {
        let snapshot = self
            .ledger
            .peer_snapshot()
            .await
            .context("Failed to fetch peer snapshot")?;
        let report = self.registry.sync(snapshot);

        let reputation = self.reputation.clone();
        let identities = self.registry.identities();
        let mut replaced = tokio::task::spawn_blocking(move || reputation.sync_identities(&identities))
            .await
            .context("Reputation writer task failed")?
            .context("Failed to reconcile reputation identities")?;
        replaced.extend(report.replaced.iter().copied());
        replaced.sort();
        replaced.dedup();

        if !replaced.is_empty() {
            self.volumes.clear_peers(&replaced);
            self.prober.forget(&replaced);
            self.persist_volumes()
                .await
                .context("Failed to persist volumes after peer replacement")?;
        }
        if report.has_changes() || !replaced.is_empty() {
            self.sampler.reset_pool();
        }
        self.metrics.update_scores(&self.reputation.statistics());

        info!(
            "Registry sync: {} peers, {} added, {} replaced",
            report.total,
            report.added.len(),
            replaced.len()
        );
        Ok(report)
    }

    /// Ping every peer and refresh reachability
    pub async fn ping_round(&self, height: u64) -> LivenessReport {
        let report = self.prober.probe_all(height).await;
        info!(
            "Liveness at height {}: {} reachable, {} unreachable",
            height,
            report.reachable.len(),
            report.unreachable.len()
        );
        report
    }

    /// Run one query round
    ///
    /// Returns `None` when no peer is eligible. Only persistence failures are
    /// surfaced; per-peer failures end up as zero rewards.
    pub async fn query_round(&self, height: u64) -> Result<Option<RoundSummary>> {
        let query = self.next_query();
        let round_id = Uuid::new_v4();

        let sampled = match self.sampler.sample(self.config.network.sample_size, &[]) {
            Ok(sampled) => sampled,
            Err(NetworkError::NoPeersAvailable) => {
                debug!("Round {}: no eligible peers", round_id);
                return Ok(None);
            }
            Err(e) => return Err(e).context("Failed to sample peers"),
        };

        // One snapshot for the whole round
        let snapshot = self.reputation.snapshot();

        let mut round = QueryRound::new(query.clone(), sampled.clone());
        round.responses = self
            .dispatcher
            .dispatch(&sampled, &query, self.config.query_timeout())
            .await;

        let valid = round.valid_responses();
        let (source, decision) = self
            .consensus
            .source_of_truth(&valid, &snapshot.scores, &query, self.oracle.as_ref())
            .await;
        round.source_of_truth = source;

        let rewards = self
            .scoring
            .score_round(&round.responses, round.source_of_truth.as_ref());
        let absent = round.absent_count();

        self.metrics.record_round(
            decision.used_oracle(),
            round.source_of_truth.is_some(),
            absent,
            rewards.values(),
        );

        info!(
            "Round {} ({}) at height {}: {} sampled, {} absent, {:?}",
            round_id,
            query.kind,
            height,
            sampled.len(),
            absent,
            decision
        );

        match self.config.scoring.reward_source {
            RewardSource::Content => {
                self.commit_rewards(rewards.clone())
                    .await
                    .context("Reputation update not committed")?;
            }
            RewardSource::Volume => {
                let mut credited = 0;
                for (id, response) in &valid {
                    if rewards.get(id).copied().unwrap_or(0.0) > 0.0 {
                        credited += self.volumes.record(height, *id, &item_keys(response));
                    }
                }
                debug!("Round {}: credited {} new items", round_id, credited);
                self.persist_volumes()
                    .await
                    .context("Failed to persist volumes")?;
            }
        }

        Ok(Some(RoundSummary {
            round_id,
            query,
            decision,
            rewards,
            absent,
        }))
    }

    /// Turn scores into weights and emit them to the ledger
    ///
    /// Retries back off exponentially and stop early on `cancel`.
    pub async fn weights_round(&self, cancel: &CancellationToken) -> Result<EmissionOutcome> {
        if self.config.scoring.reward_source == RewardSource::Volume {
            let volume_rewards = self.volumes.rewards();
            let rewards: HashMap<PeerId, f64> = self
                .registry
                .ids()
                .into_iter()
                .map(|id| (id, volume_rewards.get(&id).copied().unwrap_or(0.0)))
                .collect();
            self.commit_rewards(rewards)
                .await
                .context("Volume rewards not committed")?;
        }

        let ids = self.registry.ids();
        if ids.is_empty() {
            debug!("No known peers, skipping weight emission");
            return Ok(EmissionOutcome::Skipped);
        }

        let snapshot = self.reputation.snapshot();
        let set = self.weights.process(&ids, &snapshot.scores);
        info!(
            "Weights over {} of {} peers, max share {:.4}",
            set.len(),
            ids.len(),
            set.max_weight()
        );
        *self.latest_weights.write() = Some(set.clone());

        let outcome = self.emit_with_backoff(&set, cancel).await;
        match &outcome {
            EmissionOutcome::Emitted { .. } => self.metrics.record_emission(true),
            EmissionOutcome::Failed { attempts } => {
                self.metrics.record_emission(false);
                error!("Weight emission abandoned after {} attempts", attempts);
            }
            _ => {}
        }
        Ok(outcome)
    }

    async fn emit_with_backoff(&self, set: &WeightSet, cancel: &CancellationToken) -> EmissionOutcome {
        let mut backoff = BackoffState::new(self.config.emission.clone());

        loop {
            // One initial try plus every retry handed out so far
            let attempts = backoff.attempts() + 1;
            match self.ledger.emit_weights(&set.ids, &set.weights).await {
                Ok(()) => {
                    info!("Emitted weights for {} peers", set.len());
                    return EmissionOutcome::Emitted {
                        peers: set.len(),
                        attempts,
                    };
                }
                Err(e) => {
                    warn!("Weight emission attempt {} failed: {}", attempts, e);
                    let Some(delay) = backoff.next_delay() else {
                        return EmissionOutcome::Failed { attempts };
                    };
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Weight emission cancelled during backoff");
                            return EmissionOutcome::Cancelled;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Blend rewards into reputation off the async workers
    ///
    /// The synced store write blocks, so it runs on the blocking pool.
    async fn commit_rewards(&self, rewards: HashMap<PeerId, f64>) -> Result<()> {
        let reputation = self.reputation.clone();
        let committed = tokio::task::spawn_blocking(move || reputation.update(&rewards))
            .await
            .context("Reputation writer task failed")?;
        if let Err(e) = committed {
            self.metrics.record_persistence_failure();
            return Err(e.into());
        }
        self.metrics.update_scores(&self.reputation.statistics());
        Ok(())
    }

    async fn persist_volumes(&self) -> Result<()> {
        let store = self.state_store.clone();
        let state = self.volumes.state();
        let saved = tokio::task::spawn_blocking(move || store.save_volumes(&state))
            .await
            .context("Volume writer task failed")?;
        if let Err(e) = saved {
            self.metrics.record_persistence_failure();
            return Err(e.into());
        }
        Ok(())
    }

    fn next_query(&self) -> Query {
        let queries = &self.config.queries;
        let index = self.query_cursor.fetch_add(1, Ordering::Relaxed) % queries.len();
        queries[index].clone()
    }
}
