//! Query and per-round response types

use super::peer::PeerId;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Opaque data-fetch request issued identically to every sampled peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Request type understood by peers and the oracle (e.g. "profile")
    pub kind: String,

    /// Request parameters
    #[serde(default)]
    pub params: Value,
}

impl Query {
    /// Create a new query
    pub fn new<S: Into<String>>(kind: S, params: Value) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    /// Encode the query for the transport
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a query received from the transport
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// State of a single dispatch; discarded after scoring
#[derive(Debug, Clone)]
pub struct QueryRound {
    /// The query that was dispatched
    pub query: Query,

    /// Peers sampled for this round
    pub sampled_peers: Vec<PeerId>,

    /// Parsed responses; `None` marks an absent or malformed answer
    pub responses: HashMap<PeerId, Option<Value>>,

    /// Answer treated as correct for scoring
    pub source_of_truth: Option<Value>,
}

impl QueryRound {
    /// Create a round for a set of sampled peers
    pub fn new(query: Query, sampled_peers: Vec<PeerId>) -> Self {
        Self {
            query,
            sampled_peers,
            responses: HashMap::new(),
            source_of_truth: None,
        }
    }

    /// Responses that were present and parsed
    pub fn valid_responses(&self) -> HashMap<PeerId, Value> {
        self.responses
            .iter()
            .filter_map(|(id, resp)| resp.as_ref().map(|v| (*id, v.clone())))
            .collect()
    }

    /// Number of sampled peers without a usable response
    pub fn absent_count(&self) -> usize {
        self.sampled_peers.len() - self.valid_responses().len()
    }
}
