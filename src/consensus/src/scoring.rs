//! Response scoring against the source of truth
//!
//! Field mode is a per-field edit-distance proxy: start at 1.0 and subtract a
//! fixed penalty for every source field the response is missing or gets
//! wrong. Semantic mode first clusters the round's responses together with the
//! source of truth and gives full reward to anything sharing its cluster.

use crate::clustering::SemanticClusterer;
use crate::error::{ConsensusError, Result};
use peerscore_core::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Penalty per missing or mismatched field
pub const DEFAULT_FIELD_PENALTY: f64 = 0.1;

/// Scoring strategy for a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Structured records compared field by field
    #[default]
    Fields,
    /// Free-form content grouped by similarity
    Semantic,
}

/// Scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub field_penalty: f64,
    pub mode: ScoringMode,
    /// Number of clusters in semantic mode
    pub cluster_count: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            field_penalty: DEFAULT_FIELD_PENALTY,
            mode: ScoringMode::Fields,
            cluster_count: 2,
        }
    }
}

impl ScoringConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.field_penalty > 0.0 && self.field_penalty <= 1.0) {
            return Err(ConsensusError::Configuration(format!(
                "field_penalty must be in (0, 1], got {}",
                self.field_penalty
            )));
        }
        if self.cluster_count == 0 {
            return Err(ConsensusError::Configuration(
                "cluster_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Turns responses into rewards in `[0, 1]`
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
    clusterer: SemanticClusterer,
}

impl ScoringEngine {
    /// Create a scoring engine
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        let clusterer = SemanticClusterer::new(config.cluster_count);
        Ok(Self { config, clusterer })
    }

    /// Scoring mode in effect
    pub fn mode(&self) -> ScoringMode {
        self.config.mode
    }

    /// Field-penalty score of one response
    ///
    /// An absent or null response scores exactly 0. A non-object source is
    /// compared as a single field.
    pub fn score(&self, response: Option<&Value>, source: &Value) -> f64 {
        let response = match response {
            None | Some(Value::Null) => return 0.0,
            Some(r) => r,
        };
        let penalty = self.config.field_penalty;

        let score = match source {
            Value::Object(fields) => {
                let wrong = fields
                    .iter()
                    .filter(|(key, expected)| match response.get(key.as_str()) {
                        None | Some(Value::Null) => true,
                        Some(actual) => actual != *expected,
                    })
                    .count();
                1.0 - penalty * wrong as f64
            }
            other if response == other => 1.0,
            _ => 1.0 - penalty,
        };
        score.clamp(0.0, 1.0)
    }

    /// Reward for every peer of a round
    ///
    /// Without a source of truth every peer gets 0. Absent responses always
    /// get an explicit 0.
    pub fn score_round(
        &self,
        responses: &HashMap<PeerId, Option<Value>>,
        source: Option<&Value>,
    ) -> HashMap<PeerId, f64> {
        let Some(source) = source else {
            return responses.keys().map(|id| (*id, 0.0)).collect();
        };

        match self.config.mode {
            ScoringMode::Fields => responses
                .iter()
                .map(|(id, resp)| (*id, self.score(resp.as_ref(), source)))
                .collect(),
            ScoringMode::Semantic => self.score_semantic(responses, source),
        }
    }

    fn score_semantic(
        &self,
        responses: &HashMap<PeerId, Option<Value>>,
        source: &Value,
    ) -> HashMap<PeerId, f64> {
        let mut present: Vec<(PeerId, &Value)> = responses
            .iter()
            .filter_map(|(id, resp)| resp.as_ref().map(|v| (*id, v)))
            .collect();
        present.sort_by_key(|(id, _)| *id);

        // Source of truth goes first so it seeds cluster 0
        let mut documents = Vec::with_capacity(present.len() + 1);
        documents.push(source);
        documents.extend(present.iter().map(|(_, v)| *v));
        let labels = self.clusterer.cluster(&documents);
        let source_label = labels[0];

        let mut rewards: HashMap<PeerId, f64> =
            responses.keys().map(|id| (*id, 0.0)).collect();
        for (i, (id, value)) in present.iter().enumerate() {
            let label = labels[i + 1];
            let reward = if source_label.is_some() && label == source_label {
                1.0
            } else {
                self.score(Some(value), source)
            };
            rewards.insert(*id, reward);
        }

        debug!(
            "Semantic scoring: {} of {} responses share the source cluster",
            rewards.values().filter(|r| **r == 1.0).count(),
            present.len()
        );
        rewards
    }
}
