//! Lag computation and diagnostic queries over the ledgers.
//!
//! Lag is never an error. When the data needed to compute it is missing or a
//! source reports itself unhealthy, the result is [`LAG_SENTINEL`], which
//! callers read as "unknown, treat as critical". Lag is `now - timestamp`
//! saturated at the `i64` bounds, so no timestamp can make it overflow.
//!
//! Every lookup holds the read side of the partition's transition lock, and
//! scans hold it for every stripe, so a partition changing role is seen in
//! exactly one ledger.

use std::sync::{Arc, RwLockReadGuard};

use serde::Serialize;

use super::ledger::LagLedger;
use super::transition::TransitionLocks;
use crate::constants::LAG_SENTINEL;
use crate::error::MonitorResult;
use crate::types::{
    PartitionId, ReplicaRole, ResourceName, TimestampMs, VersionNumber, is_separate_topic_region,
};

/// One region entry of one replica, as returned by diagnostic queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaHeartbeatInfo {
    /// `<store>_v<version>-<partition>`.
    pub replica_id: String,
    pub partition: PartitionId,
    pub region: String,
    pub role: ReplicaRole,
    pub timestamp: TimestampMs,
    pub lag_ms: i64,
    pub ready_to_serve: bool,
}

/// Read-only view over both ledgers.
pub struct LagQueryEngine {
    leader: Arc<LagLedger>,
    follower: Arc<LagLedger>,
    locks: Arc<TransitionLocks>,
    lagging_threshold_ms: i64,
}

impl LagQueryEngine {
    pub fn new(
        leader: Arc<LagLedger>,
        follower: Arc<LagLedger>,
        locks: Arc<TransitionLocks>,
        lagging_threshold_ms: i64,
    ) -> Self {
        Self {
            leader,
            follower,
            locks,
            lagging_threshold_ms,
        }
    }

    pub fn lagging_threshold_ms(&self) -> i64 {
        self.lagging_threshold_ms
    }

    fn ledger(&self, role: ReplicaRole) -> &LagLedger {
        match role {
            ReplicaRole::Leader => &self.leader,
            ReplicaRole::Follower => &self.follower,
        }
    }

    /// Role a partition is currently monitored in, if any.
    pub fn monitored_role(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
    ) -> Option<ReplicaRole> {
        let _guard = self.locks.read(store, version, partition);
        [ReplicaRole::Leader, ReplicaRole::Follower]
            .into_iter()
            .find(|role| self.ledger(*role).contains_partition(store, version, partition))
    }

    /// Worst lag across the plain regions of a leader partition.
    ///
    /// `_sep` regions are ignored. Any considered region that is unavailable
    /// or not caught up makes the whole partition report the sentinel.
    pub fn leader_max_lag(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
        now: TimestampMs,
    ) -> i64 {
        let regions = {
            let _guard = self.locks.read(store, version, partition);
            self.leader.partition_regions(store, version, partition)
        };
        let Some(regions) = regions else {
            return LAG_SENTINEL;
        };

        let mut max_lag = 0;
        for (region, entry) in regions {
            if is_separate_topic_region(&region) {
                continue;
            }
            if !entry.is_healthy() {
                return LAG_SENTINEL;
            }
            max_lag = max_lag.max(now.saturating_sub(entry.timestamp));
        }
        max_lag
    }

    /// Lag of a follower partition, measured on the local region only.
    ///
    /// Region availability is not consulted; a local replica that has not
    /// caught up reports the sentinel.
    pub fn follower_lag(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
        local_region: &str,
        now: TimestampMs,
    ) -> i64 {
        let entry = {
            let _guard = self.locks.read(store, version, partition);
            self.follower.get(store, version, partition, local_region)
        };
        match entry {
            Some(entry) if entry.caught_up => now.saturating_sub(entry.timestamp),
            _ => LAG_SENTINEL,
        }
    }

    /// Records of one role for a resource.
    ///
    /// A negative `partition_filter` selects every partition. With
    /// `only_lagging`, only records whose lag exceeds the configured threshold
    /// are kept. An unknown store or version yields no records.
    pub fn filtered_info(
        &self,
        role: ReplicaRole,
        now: TimestampMs,
        resource_name: &str,
        partition_filter: PartitionId,
        only_lagging: bool,
    ) -> MonitorResult<Vec<ReplicaHeartbeatInfo>> {
        let resource = ResourceName::parse(resource_name)?;
        let filter = (partition_filter >= 0).then_some(partition_filter);
        let _guards = self.scan_guards(&resource, filter);
        Ok(self.collect_info(role, now, &resource, filter, only_lagging))
    }

    /// Leader records followed by follower records for a resource.
    ///
    /// Both ledgers are read under one set of guards, so a partition that
    /// changes role meanwhile is listed exactly once.
    pub fn get_heartbeat_info(
        &self,
        resource_name: &str,
        partition_filter: PartitionId,
        only_lagging: bool,
        now: TimestampMs,
    ) -> MonitorResult<Vec<ReplicaHeartbeatInfo>> {
        let resource = ResourceName::parse(resource_name)?;
        let filter = (partition_filter >= 0).then_some(partition_filter);
        let _guards = self.scan_guards(&resource, filter);
        let mut records =
            self.collect_info(ReplicaRole::Leader, now, &resource, filter, only_lagging);
        records.extend(self.collect_info(
            ReplicaRole::Follower,
            now,
            &resource,
            filter,
            only_lagging,
        ));
        Ok(records)
    }

    fn scan_guards(
        &self,
        resource: &ResourceName,
        filter: Option<PartitionId>,
    ) -> Vec<RwLockReadGuard<'_, ()>> {
        match filter {
            Some(partition) => {
                vec![self.locks.read(resource.store(), resource.version(), partition)]
            }
            None => self.locks.read_all(),
        }
    }

    fn collect_info(
        &self,
        role: ReplicaRole,
        now: TimestampMs,
        resource: &ResourceName,
        filter: Option<PartitionId>,
        only_lagging: bool,
    ) -> Vec<ReplicaHeartbeatInfo> {
        let Some(rows) = self
            .ledger(role)
            .version_rows(resource.store(), resource.version(), filter)
        else {
            return Vec::new();
        };

        let mut records: Vec<ReplicaHeartbeatInfo> = rows
            .into_iter()
            .map(|row| ReplicaHeartbeatInfo {
                replica_id: resource.replica_id(row.partition),
                partition: row.partition,
                region: row.region.to_string(),
                role,
                timestamp: row.entry.timestamp,
                lag_ms: now.saturating_sub(row.entry.timestamp),
                ready_to_serve: row.entry.caught_up,
            })
            .filter(|record| !only_lagging || record.lag_ms > self.lagging_threshold_ms)
            .collect();
        records.sort_by(|a, b| {
            a.partition
                .cmp(&b.partition)
                .then_with(|| a.region.cmp(&b.region))
        });
        records
    }
}
