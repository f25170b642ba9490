//! Durable state storage
//!
//! The reputation vector and identity list are written together in one
//! RocksDB batch with a synced WAL, so a crash or shutdown leaves either the
//! previous snapshot or the new one on disk, never a mix of the two.

use crate::error::{ReputationError, Result};
use crate::types::{ReputationState, VolumeState};
use parking_lot::Mutex;
use rocksdb::{Options, WriteBatch, WriteOptions, DB};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const KEY_SCORES: &[u8] = b"reputation/scores";
const KEY_IDENTITIES: &[u8] = b"reputation/identities";
const KEY_VOLUMES: &[u8] = b"volume/state";

/// Key-value persistence for validator state
pub trait StateStore: Send + Sync {
    /// Load the reputation vector, if one was ever saved
    fn load_reputation(&self) -> Result<Option<ReputationState>>;

    /// Atomically replace the reputation vector and identity list
    fn save_reputation(&self, state: &ReputationState) -> Result<()>;

    /// Load the volume ledger, if one was ever saved
    fn load_volumes(&self) -> Result<Option<VolumeState>>;

    /// Replace the volume ledger
    fn save_volumes(&self, state: &VolumeState) -> Result<()>;
}

/// RocksDB-backed state store
pub struct RocksDbStateStore {
    db: DB,
}

impl RocksDbStateStore {
    /// Open or create a store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path.as_ref())
            .map_err(|e| ReputationError::Persistence(format!("Failed to open RocksDB: {}", e)))?;
        Ok(Self { db })
    }

    fn synced() -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(true);
        opts
    }

    fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.db.get(key)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| ReputationError::CorruptState(format!("{}: {}", String::from_utf8_lossy(key), e))),
            None => Ok(None),
        }
    }
}

impl StateStore for RocksDbStateStore {
    fn load_reputation(&self) -> Result<Option<ReputationState>> {
        let scores: Option<Vec<f64>> = self.get(KEY_SCORES)?;
        let identities: Option<Vec<String>> = self.get(KEY_IDENTITIES)?;
        Ok(match (scores, identities) {
            (None, None) => None,
            (scores, identities) => Some(ReputationState {
                scores: scores.unwrap_or_default(),
                identities: identities.unwrap_or_default(),
            }),
        })
    }

    fn save_reputation(&self, state: &ReputationState) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put(KEY_SCORES, bincode::serialize(&state.scores)?);
        batch.put(KEY_IDENTITIES, bincode::serialize(&state.identities)?);
        self.db.write_opt(batch, &Self::synced())?;
        debug!("Persisted {} reputation scores", state.scores.len());
        Ok(())
    }

    fn load_volumes(&self) -> Result<Option<VolumeState>> {
        self.get(KEY_VOLUMES)
    }

    fn save_volumes(&self, state: &VolumeState) -> Result<()> {
        let bytes = bincode::serialize(state)?;
        self.db.put_opt(KEY_VOLUMES, bytes, &Self::synced())?;
        Ok(())
    }
}

/// In-memory state store for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryStateStore {
    reputation: Mutex<Option<ReputationState>>,
    volumes: Mutex<Option<VolumeState>>,
    fail_writes: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (simulates a full or broken disk)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ReputationError::Persistence("store is read-only".to_string()));
        }
        Ok(())
    }
}

impl StateStore for MemoryStateStore {
    fn load_reputation(&self) -> Result<Option<ReputationState>> {
        Ok(self.reputation.lock().clone())
    }

    fn save_reputation(&self, state: &ReputationState) -> Result<()> {
        self.check_writable()?;
        *self.reputation.lock() = Some(state.clone());
        Ok(())
    }

    fn load_volumes(&self) -> Result<Option<VolumeState>> {
        Ok(self.volumes.lock().clone())
    }

    fn save_volumes(&self, state: &VolumeState) -> Result<()> {
        self.check_writable()?;
        *self.volumes.lock() = Some(state.clone());
        Ok(())
    }
}
