//! Fixed table of mutexes serializing remote atomic operations.
//!
//! Offsets are hashed onto shards, there are no per item locks. Offsets that share a shard
//! serialize against each other even if they are unrelated.
use crate::constants::CAS_LOCK_SHIFT;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug)]
pub struct CasLockTable {
    shards: Box<[Arc<Mutex<()>>]>,
}

/// Held for the whole atomic sequence, the shard unlocks when this is dropped.
#[derive(Debug)]
pub struct CasLockGuard {
    shard: usize,
    offset: u64,
    _guard: OwnedMutexGuard<()>,
}

impl CasLockGuard {
    pub fn shard(&self) -> usize {
        self.shard
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl CasLockTable {
    pub fn new(shard_count: usize) -> Result<CasLockTable, CasLockError> {
        if shard_count == 0 {
            return Err(CasLockError::NoShards());
        }
        let shards = (0..shard_count)
            .map(|_| Arc::new(Mutex::new(())))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(CasLockTable { shards })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_index(&self, offset: u64) -> usize {
        let shard_count = self.shards.len() as u64;
        ((offset >> CAS_LOCK_SHIFT) % shard_count) as usize
    }

    /// Not reentrant, acquiring a second guard on the same shard from the same task
    /// waits forever.
    pub async fn acquire_cas_lock(&self, offset: u64) -> CasLockGuard {
        let shard = self.shard_index(offset);
        let guard = self.shards[shard].clone().lock_owned().await;
        CasLockGuard {
            shard,
            offset,
            _guard: guard,
        }
    }

    pub fn try_acquire_cas_lock(&self, offset: u64) -> Result<CasLockGuard, CasLockError> {
        let shard = self.shard_index(offset);
        let guard = self.shards[shard]
            .clone()
            .try_lock_owned()
            .map_err(|_| CasLockError::Contended(offset, shard))?;
        Ok(CasLockGuard {
            shard,
            offset,
            _guard: guard,
        })
    }

    pub fn release_cas_lock(&self, guard: CasLockGuard) {
        drop(guard);
    }
}

#[derive(Debug, Error)]
pub enum CasLockError {
    #[error("A CAS lock table needs at least one shard")]
    NoShards(),
    #[error("CAS lock for offset {0} (shard {1}) is held")]
    Contended(u64, usize),
}
