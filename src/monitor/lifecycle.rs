//! Adds and removes monitored partitions as replicas change role.
//!
//! A partition lives in at most one of the two ledgers. Switching role moves
//! it: the partition is evacuated from the ledger of the role it is leaving
//! and seeded in the ledger of the role it takes, both under the partition's
//! write-side [`TransitionLocks`] guard. Heartbeats and lag queries take the
//! read side, so none of them sees the partition in both ledgers or in
//! neither.
//!
//! # Seeding
//!
//! Every configured region gets an entry. A region evacuated from the other
//! ledger carries its timestamp forward; regions with no history are seeded
//! with the current time, available and caught up. Entries already present in
//! the target ledger are kept as they are, flags included, and only move
//! forward if a newer timestamp was carried. Carrying history forward keeps
//! role flapping from resetting lag to an artificially fresh value.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::ledger::LagLedger;
use super::metrics;
use super::topology::VersionInfo;
use super::transition::TransitionLocks;
use crate::types::{
    PartitionId, ReplicaRole, ResourceName, TimestampMs, current_time_millis,
    is_separate_topic_region,
};

/// Role-change operations driven by the update dispatcher.
///
/// All operations are idempotent with respect to the target state.
pub trait MonitorLifecycle: Send + Sync {
    /// Start monitoring `partition` of `version` as a leader.
    fn add_leader_monitor(&self, version: &VersionInfo, partition: PartitionId);

    /// Start monitoring `partition` of `version` as a follower.
    fn add_follower_monitor(&self, version: &VersionInfo, partition: PartitionId);

    /// Stop monitoring `partition` of `resource` in whichever role it holds.
    ///
    /// Removal needs no version metadata, so it also works for versions the
    /// topology no longer knows about.
    fn remove_monitor(&self, resource: &ResourceName, partition: PartitionId);
}

/// Ledger-backed [`MonitorLifecycle`].
pub struct LifecycleManager {
    leader: Arc<LagLedger>,
    follower: Arc<LagLedger>,
    regions: Arc<[Arc<str>]>,
    locks: Arc<TransitionLocks>,
}

impl LifecycleManager {
    pub fn new(
        leader: Arc<LagLedger>,
        follower: Arc<LagLedger>,
        regions: Arc<[Arc<str>]>,
        locks: Arc<TransitionLocks>,
    ) -> Self {
        Self {
            leader,
            follower,
            regions,
            locks,
        }
    }

    fn ledger(&self, role: ReplicaRole) -> &LagLedger {
        match role {
            ReplicaRole::Leader => &self.leader,
            ReplicaRole::Follower => &self.follower,
        }
    }

    /// Regions monitored for `version`.
    fn regions_for<'a>(&'a self, version: &VersionInfo) -> impl Iterator<Item = &'a Arc<str>> {
        let include_separate = version.tracks_separate_topic_regions();
        self.regions
            .iter()
            .filter(move |region| include_separate || !is_separate_topic_region(region))
    }

    fn add_monitor(&self, role: ReplicaRole, version: &VersionInfo, partition: PartitionId) {
        let store = version.store_name();
        let number = version.number();

        if !version.is_hybrid() {
            debug!(
                store,
                version = number,
                partition,
                role = %role,
                "Skipping lag monitor for non-hybrid version"
            );
            return;
        }

        let _guard = self.locks.write(store, number, partition);

        let evacuated = self
            .ledger(role.other())
            .remove_partition(store, number, partition);
        let switched = evacuated.is_some();
        let carried: HashMap<Arc<str>, TimestampMs> = evacuated
            .into_iter()
            .flatten()
            .map(|(region, entry)| (region, entry.timestamp))
            .collect();

        let region_count = self.ledger(role).seed_partition(
            store,
            number,
            partition,
            self.regions_for(version),
            &carried,
            current_time_millis(),
        );

        metrics::record_monitor_transition(role.as_str(), switched);
        info!(
            store,
            version = number,
            partition,
            role = %role,
            regions = region_count,
            switched_role = switched,
            "Added lag monitor"
        );
    }
}

impl MonitorLifecycle for LifecycleManager {
    fn add_leader_monitor(&self, version: &VersionInfo, partition: PartitionId) {
        self.add_monitor(ReplicaRole::Leader, version, partition);
    }

    fn add_follower_monitor(&self, version: &VersionInfo, partition: PartitionId) {
        self.add_monitor(ReplicaRole::Follower, version, partition);
    }

    fn remove_monitor(&self, resource: &ResourceName, partition: PartitionId) {
        let store = resource.store();
        let number = resource.version();
        let _guard = self.locks.write(store, number, partition);

        let removed_leader = self.leader.remove_partition(store, number, partition).is_some();
        let removed_follower = self
            .follower
            .remove_partition(store, number, partition)
            .is_some();

        if removed_leader || removed_follower {
            metrics::record_monitor_transition("REMOVED", false);
            info!(
                store,
                version = number,
                partition,
                removed_leader,
                removed_follower,
                "Removed lag monitor"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::entry::HeartbeatEntry;
    use crate::types::VersionNumber;

    fn manager(regions: &[&str]) -> LifecycleManager {
        let regions: Arc<[Arc<str>]> = regions.iter().map(|r| Arc::from(*r)).collect();
        LifecycleManager::new(
            Arc::new(LagLedger::new(ReplicaRole::Leader)),
            Arc::new(LagLedger::new(ReplicaRole::Follower)),
            regions,
            Arc::new(TransitionLocks::default()),
        )
    }

    fn hybrid(number: VersionNumber) -> VersionInfo {
        VersionInfo::new("orders", number).with_hybrid(true)
    }

    #[test]
    fn test_non_hybrid_version_is_not_monitored() {
        let manager = manager(&["dc-0", "dc-1"]);
        let batch_only = VersionInfo::new("orders", 1);

        manager.add_leader_monitor(&batch_only, 0);
        manager.add_follower_monitor(&batch_only, 0);

        assert!(manager.leader.is_empty());
        assert!(manager.follower.is_empty());
    }

    #[test]
    fn test_add_seeds_every_plain_region() {
        let manager = manager(&["dc-0", "dc-1", "dc-1_sep"]);
        let before = current_time_millis();
        manager.add_follower_monitor(&hybrid(2), 0);

        let regions = manager.follower.partition_regions("orders", 2, 0).unwrap();
        assert_eq!(regions.len(), 2);
        for (region, entry) in regions {
            assert!(!is_separate_topic_region(&region));
            assert!(entry.is_healthy());
            assert!(entry.timestamp >= before);
        }
    }

    #[test]
    fn test_separate_topic_region_requires_both_flags() {
        let manager = manager(&["dc-0", "dc-1", "dc-1_sep"]);

        let aa_only = hybrid(2).with_active_active(true);
        manager.add_leader_monitor(&aa_only, 0);
        assert_eq!(manager.leader.partition_regions("orders", 2, 0).unwrap().len(), 2);

        let sep_only = hybrid(3).with_separate_real_time_topic(true);
        manager.add_leader_monitor(&sep_only, 0);
        assert_eq!(manager.leader.partition_regions("orders", 3, 0).unwrap().len(), 2);

        let both = hybrid(4)
            .with_active_active(true)
            .with_separate_real_time_topic(true);
        manager.add_leader_monitor(&both, 0);
        assert_eq!(manager.leader.partition_regions("orders", 4, 0).unwrap().len(), 3);
        assert!(manager.leader.get("orders", 4, 0, "dc-1_sep").is_some());
    }

    #[test]
    fn test_role_switch_evacuates_other_ledger() {
        let manager = manager(&["dc-0"]);
        let version = hybrid(2);

        manager.add_follower_monitor(&version, 1);
        manager.add_leader_monitor(&version, 1);
        assert!(manager.leader.contains_partition("orders", 2, 1));
        assert!(!manager.follower.contains_partition("orders", 2, 1));
        assert!(!manager.follower.contains_store("orders"));

        manager.add_follower_monitor(&version, 1);
        assert!(manager.follower.contains_partition("orders", 2, 1));
        assert!(!manager.leader.contains_store("orders"));
    }

    #[test]
    fn test_role_switch_carries_timestamp_forward_per_region() {
        let manager = manager(&["dc-0", "dc-1"]);
        let version = hybrid(2);

        manager.add_follower_monitor(&version, 0);
        manager.follower.put("orders", 2, 0, "dc-0", HeartbeatEntry::new(1_000, true, true));
        manager.follower.put("orders", 2, 0, "dc-1", HeartbeatEntry::new(2_000, false, false));

        manager.add_leader_monitor(&version, 0);
        assert_eq!(manager.leader.get("orders", 2, 0, "dc-0").unwrap().timestamp, 1_000);
        assert_eq!(manager.leader.get("orders", 2, 0, "dc-1").unwrap().timestamp, 2_000);
        assert!(manager.leader.get("orders", 2, 0, "dc-1").unwrap().is_healthy());

        manager.add_follower_monitor(&version, 0);
        assert_eq!(manager.follower.get("orders", 2, 0, "dc-0").unwrap().timestamp, 1_000);
        assert_eq!(manager.follower.get("orders", 2, 0, "dc-1").unwrap().timestamp, 2_000);
    }

    #[test]
    fn test_re_adding_same_role_keeps_history() {
        let manager = manager(&["dc-0"]);
        let version = hybrid(2);

        manager.add_follower_monitor(&version, 0);
        manager.follower.put("orders", 2, 0, "dc-0", HeartbeatEntry::new(1_234, true, true));
        manager.add_follower_monitor(&version, 0);

        assert_eq!(manager.follower.get("orders", 2, 0, "dc-0").unwrap().timestamp, 1_234);
    }

    #[test]
    fn test_re_adding_same_role_keeps_flags() {
        let manager = manager(&["dc-0", "dc-1"]);
        let version = hybrid(2);

        manager.add_follower_monitor(&version, 0);
        let catching_up = HeartbeatEntry::new(1_234, true, false);
        manager.follower.put("orders", 2, 0, "dc-0", catching_up);
        manager.add_follower_monitor(&version, 0);

        assert_eq!(manager.follower.get("orders", 2, 0, "dc-0"), Some(catching_up));
        assert!(manager.follower.get("orders", 2, 0, "dc-1").unwrap().is_healthy());
    }

    #[test]
    fn test_re_add_never_rewinds_concurrent_heartbeats() {
        let manager = Arc::new(manager(&["dc-0"]));
        let version = hybrid(2);
        manager.add_follower_monitor(&version, 0);
        let start = current_time_millis() + 1_000_000;

        let readder = {
            let manager = Arc::clone(&manager);
            let version = version.clone();
            std::thread::spawn(move || {
                for _ in 0..300 {
                    manager.add_follower_monitor(&version, 0);
                }
            })
        };

        for i in 0..300 {
            let ts = start + i;
            let applied = {
                let _guard = manager.locks.read("orders", 2, 0);
                manager
                    .follower
                    .update_existing("orders", 2, 0, "dc-0", HeartbeatEntry::seeded(ts))
            };
            assert!(applied);
            assert_eq!(manager.follower.get("orders", 2, 0, "dc-0").unwrap().timestamp, ts);
        }
        readder.join().unwrap();
    }

    #[test]
    fn test_remove_monitor_clears_either_ledger() {
        let manager = manager(&["dc-0"]);
        let version = hybrid(2);

        manager.add_leader_monitor(&version, 0);
        manager.add_follower_monitor(&version, 1);
        let resource = version.resource_name();
        manager.remove_monitor(&resource, 0);
        manager.remove_monitor(&resource, 1);
        manager.remove_monitor(&resource, 2);

        assert!(manager.leader.is_empty());
        assert!(manager.follower.is_empty());
    }

    #[test]
    fn test_concurrent_role_flapping_keeps_single_role() {
        let manager = Arc::new(manager(&["dc-0", "dc-1"]));
        let version = hybrid(2);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let manager = Arc::clone(&manager);
                let version = version.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        if i % 2 == 0 {
                            manager.add_leader_monitor(&version, 0);
                        } else {
                            manager.add_follower_monitor(&version, 0);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let in_leader = manager.leader.contains_partition("orders", 2, 0);
        let in_follower = manager.follower.contains_partition("orders", 2, 0);
        assert!(in_leader ^ in_follower);
    }
}
