//! File-backed ledger for single-host runs
//!
//! The peer population is read from a JSON array of peers, height advances
//! with wall-clock time at a fixed block time, and every emitted weight set is
//! appended as one JSON line.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use peerscore_core::{CoreError, Ledger, Peer, PeerId, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// One emitted weight set as written to the weights file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionRecord {
    pub timestamp: DateTime<Utc>,
    pub height: u64,
    pub ids: Vec<PeerId>,
    pub weights: Vec<f64>,
}

pub struct FileLedger {
    peers_file: PathBuf,
    weights_file: PathBuf,
    block_time: Duration,
    started: Instant,
}

impl FileLedger {
    pub fn new(peers_file: PathBuf, weights_file: PathBuf, block_time: Duration) -> Self {
        Self {
            peers_file,
            weights_file,
            block_time,
            started: Instant::now(),
        }
    }

    fn height(&self) -> u64 {
        let block_ms = self.block_time.as_millis().max(1);
        (self.started.elapsed().as_millis() / block_ms) as u64
    }
}

#[async_trait]
impl Ledger for FileLedger {
    async fn current_height(&self) -> Result<u64> {
        Ok(self.height())
    }

    async fn emit_weights(&self, ids: &[PeerId], weights: &[f64]) -> Result<()> {
        if ids.len() != weights.len() {
            return Err(CoreError::invalid(format!(
                "{} ids but {} weights",
                ids.len(),
                weights.len()
            )));
        }

        let record = EmissionRecord {
            timestamp: Utc::now(),
            height: self.height(),
            ids: ids.to_vec(),
            weights: weights.to_vec(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.weights_file)
            .await
            .map_err(|e| CoreError::Ledger(format!("open {:?}: {}", self.weights_file, e)))?;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!("Appended weights for {} peers to {:?}", ids.len(), self.weights_file);
        Ok(())
    }

    async fn peer_snapshot(&self) -> Result<Vec<Peer>> {
        let bytes = tokio::fs::read(&self.peers_file)
            .await
            .map_err(|e| CoreError::Ledger(format!("read {:?}: {}", self.peers_file, e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
