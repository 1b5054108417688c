//! Four-level concurrent heartbeat ledger.
//!
//! A ledger maps `store -> version -> partition -> region -> HeartbeatEntry`.
//! The monitor keeps two of them, one per [`ReplicaRole`].
//!
//! # Concurrency
//!
//! Every level is a sharded [`DashMap`], so heartbeats for unrelated
//! partitions never contend on a shared lock. Operations always descend from
//! the store level down, holding the parent guard while touching the child:
//!
//! - Creation paths (`put`, `put_partition`) take the parent entry (write guard)
//!   so two creators cannot build duplicate intermediate maps.
//! - The heartbeat path (`update_existing`) only takes read guards on the upper
//!   levels and never creates them.
//! - Pruning uses `remove_if` on the parent, which needs the parent shard's
//!   write lock. Any writer still inside the child holds a guard on that shard,
//!   so an empty check can never race with an in-flight insert.
//!
//! Locks are only ever acquired top-down, which rules out lock-order cycles.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::entry::HeartbeatEntry;
use crate::types::{PartitionId, ReplicaRole, TimestampMs, VersionNumber};

type RegionMap = DashMap<Arc<str>, HeartbeatEntry>;
type PartitionMap = DashMap<PartitionId, RegionMap>;
type VersionMap = DashMap<VersionNumber, PartitionMap>;

/// One row of a ledger snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub version: VersionNumber,
    pub partition: PartitionId,
    pub region: Arc<str>,
    pub entry: HeartbeatEntry,
}

/// Heartbeat ledger for one replica role.
#[derive(Debug)]
pub struct LagLedger {
    role: ReplicaRole,
    stores: DashMap<Arc<str>, VersionMap>,
}

impl LagLedger {
    pub fn new(role: ReplicaRole) -> Self {
        Self {
            role,
            stores: DashMap::new(),
        }
    }

    /// Role whose partitions this ledger tracks.
    pub fn role(&self) -> ReplicaRole {
        self.role
    }

    /// Look up a single region entry.
    pub fn get(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
        region: &str,
    ) -> Option<HeartbeatEntry> {
        let versions = self.stores.get(store)?;
        let partitions = versions.get(&version)?;
        let regions = partitions.get(&partition)?;
        let entry = regions.get(region)?;
        Some(*entry)
    }

    /// Insert or replace an entry, creating intermediate levels as needed.
    pub fn put(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
        region: &str,
        entry: HeartbeatEntry,
    ) {
        self.put_partition(store, version, partition, [(Arc::from(region), entry)]);
    }

    /// Insert or replace several region entries of one partition at once.
    ///
    /// The partition becomes visible with all of `entries` already present
    /// when it did not exist before.
    pub fn put_partition<I>(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
        entries: I,
    ) where
        I: IntoIterator<Item = (Arc<str>, HeartbeatEntry)>,
    {
        let entries: Vec<_> = entries.into_iter().collect();
        if entries.is_empty() {
            return;
        }

        let versions = self.stores.entry(Arc::from(store)).or_default();
        let partitions = versions.entry(version).or_default();
        match partitions.get(&partition) {
            Some(regions) => {
                for (region, entry) in entries {
                    regions.insert(region, entry);
                }
            }
            None => {
                partitions.insert(partition, entries.into_iter().collect::<RegionMap>());
            }
        }
    }

    /// Seed region entries of one partition without clobbering live data.
    ///
    /// Absent regions are created healthy at their `carried` timestamp, or at
    /// `fresh` when nothing was carried. Present entries keep their flags; a
    /// carried timestamp only ever moves them forward. Returns the number of
    /// regions seeded or kept.
    pub fn seed_partition<'a, I>(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
        regions: I,
        carried: &HashMap<Arc<str>, TimestampMs>,
        fresh: TimestampMs,
    ) -> usize
    where
        I: IntoIterator<Item = &'a Arc<str>>,
    {
        let regions: Vec<&Arc<str>> = regions.into_iter().collect();
        if regions.is_empty() {
            return 0;
        }

        let versions = self.stores.entry(Arc::from(store)).or_default();
        let partitions = versions.entry(version).or_default();
        // The partition shard stays write-locked until every region is in.
        let entries = partitions.entry(partition).or_default();
        let count = regions.len();
        for region in regions {
            let key: &str = region;
            let carried_ts = carried.get(key).copied();
            entries
                .entry(Arc::clone(region))
                .and_modify(|entry| {
                    if let Some(ts) = carried_ts {
                        entry.timestamp = entry.timestamp.max(ts);
                    }
                })
                .or_insert_with(|| HeartbeatEntry::seeded(carried_ts.unwrap_or(fresh)));
        }
        count
    }

    /// Replace a region entry only if the partition is registered.
    ///
    /// Returns false when the (store, version, partition) path does not exist,
    /// in which case nothing is written. Unknown regions of a registered
    /// partition are added.
    pub fn update_existing(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
        region: &str,
        entry: HeartbeatEntry,
    ) -> bool {
        let Some(versions) = self.stores.get(store) else {
            return false;
        };
        let Some(partitions) = versions.get(&version) else {
            return false;
        };
        let Some(regions) = partitions.get(&partition) else {
            return false;
        };

        if let Some(mut existing) = regions.get_mut(region) {
            *existing = entry;
            return true;
        }
        regions.insert(Arc::from(region), entry);
        true
    }

    /// Remove a partition and prune version and store levels left empty.
    ///
    /// Returns the evacuated region entries, or `None` if the partition was
    /// not present.
    pub fn remove_partition(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
    ) -> Option<Vec<(Arc<str>, HeartbeatEntry)>> {
        let removed = {
            let versions = self.stores.get(store)?;
            let removed = versions
                .get(&version)
                .and_then(|partitions| partitions.remove(&partition))
                .map(|(_, regions)| regions.into_iter().collect::<Vec<_>>());
            versions.remove_if(&version, |_, partitions| partitions.is_empty());
            removed
        };
        // The store guard above must be released before pruning the store level.
        self.stores
            .remove_if(store, |_, versions| versions.is_empty());
        removed
    }

    /// All region entries of one partition.
    pub fn partition_regions(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
    ) -> Option<Vec<(Arc<str>, HeartbeatEntry)>> {
        let versions = self.stores.get(store)?;
        let partitions = versions.get(&version)?;
        let regions = partitions.get(&partition)?;
        let entries = regions
            .iter()
            .map(|r| (Arc::clone(r.key()), *r.value()))
            .collect();
        Some(entries)
    }

    /// Rows of one store version, optionally limited to one partition.
    ///
    /// Returns `None` when the store version is not present at all.
    pub fn version_rows(
        &self,
        store: &str,
        version: VersionNumber,
        partition_filter: Option<PartitionId>,
    ) -> Option<Vec<LedgerRow>> {
        let versions = self.stores.get(store)?;
        let partitions = versions.get(&version)?;

        let mut rows = Vec::new();
        for p in partitions.iter() {
            if partition_filter.is_some_and(|wanted| wanted != *p.key()) {
                continue;
            }
            for r in p.value().iter() {
                rows.push(LedgerRow {
                    version,
                    partition: *p.key(),
                    region: Arc::clone(r.key()),
                    entry: *r.value(),
                });
            }
        }
        Some(rows)
    }

    /// Every row of a store.
    ///
    /// Individual entries are never torn, but heartbeats landing during the
    /// walk may or may not be reflected.
    pub fn snapshot(&self, store: &str) -> Vec<LedgerRow> {
        let Some(versions) = self.stores.get(store) else {
            return Vec::new();
        };

        let mut rows = Vec::new();
        for v in versions.iter() {
            for p in v.value().iter() {
                for r in p.value().iter() {
                    rows.push(LedgerRow {
                        version: *v.key(),
                        partition: *p.key(),
                        region: Arc::clone(r.key()),
                        entry: *r.value(),
                    });
                }
            }
        }
        rows
    }

    pub fn contains_store(&self, store: &str) -> bool {
        self.stores.contains_key(store)
    }

    pub fn contains_version(&self, store: &str, version: VersionNumber) -> bool {
        self.stores
            .get(store)
            .is_some_and(|versions| versions.contains_key(&version))
    }

    pub fn contains_partition(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
    ) -> bool {
        self.stores.get(store).is_some_and(|versions| {
            versions
                .get(&version)
                .is_some_and(|partitions| partitions.contains_key(&partition))
        })
    }

    /// Names of all stores currently tracked.
    pub fn stores(&self) -> Vec<Arc<str>> {
        self.stores.iter().map(|s| Arc::clone(s.key())).collect()
    }

    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    pub fn version_count(&self, store: &str) -> usize {
        self.stores.get(store).map_or(0, |versions| versions.len())
    }

    pub fn partition_count(&self, store: &str, version: VersionNumber) -> usize {
        self.stores.get(store).map_or(0, |versions| {
            versions
                .get(&version)
                .map_or(0, |partitions| partitions.len())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
