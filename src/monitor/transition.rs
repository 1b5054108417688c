//! Per-partition transition locks shared by every path that reads or writes
//! a partition's role.
//!
//! Role changes take the write side for their partition; heartbeats and lag
//! queries take the read side. A reader therefore never observes a partition
//! between evacuation from one ledger and seeding in the other, while
//! heartbeats for the same partition still proceed in parallel with each
//! other.
//!
//! Locks are striped to bound memory. Unrelated partitions may share a stripe,
//! which only costs contention, never correctness. A poisoned stripe is reused
//! since every critical section only touches the concurrent ledgers.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::constants::TRANSITION_LOCK_STRIPES;
use crate::types::{PartitionId, VersionNumber};

/// Striped reader-writer locks keyed by (store, version, partition).
#[derive(Debug)]
pub struct TransitionLocks {
    stripes: Box<[RwLock<()>]>,
}

impl TransitionLocks {
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| RwLock::new(())).collect();
        Self { stripes }
    }

    fn stripe(&self, store: &str, version: VersionNumber, partition: PartitionId) -> &RwLock<()> {
        let mut hasher = DefaultHasher::new();
        (store, version, partition).hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }

    /// Exclusive access for a role change of one partition.
    pub fn write(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
    ) -> RwLockWriteGuard<'_, ()> {
        self.stripe(store, version, partition)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared access for heartbeats and lookups of one partition.
    pub fn read(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
    ) -> RwLockReadGuard<'_, ()> {
        self.stripe(store, version, partition)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared access to every stripe, for scans spanning many partitions.
    ///
    /// Stripes are taken in index order. Writers only ever hold one stripe,
    /// so this cannot deadlock against them. Callers must not already hold a
    /// stripe.
    pub fn read_all(&self) -> Vec<RwLockReadGuard<'_, ()>> {
        self.stripes
            .iter()
            .map(|stripe| stripe.read().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }
}

impl Default for TransitionLocks {
    fn default() -> Self {
        Self::new(TRANSITION_LOCK_STRIPES)
    }
}
