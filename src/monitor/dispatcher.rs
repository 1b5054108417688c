//! Turns role-change notifications into lifecycle calls.
//!
//! Callers only know a resource by name. The dispatcher resolves the name
//! through the [`TopologyAuthority`], retrying transient failures within the
//! configured wait budget, and forwards to the matching
//! [`MonitorLifecycle`] operation once both store and version are known.
//! Removal is the exception: it only needs the parsed name, so it goes ahead
//! even when the version is gone from the topology. Nothing is held locked
//! while waiting on the authority.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::lifecycle::MonitorLifecycle;
use super::metrics;
use super::retry;
use super::topology::{TopologyAuthority, VersionInfo};
use crate::error::{MonitorError, MonitorResult};
use crate::types::{PartitionId, ResourceName};

/// Requested monitor change for one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LagMonitorAction {
    SetLeaderMonitor,
    SetFollowerMonitor,
    RemoveMonitor,
}

impl LagMonitorAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LagMonitorAction::SetLeaderMonitor => "SET_LEADER_MONITOR",
            LagMonitorAction::SetFollowerMonitor => "SET_FOLLOWER_MONITOR",
            LagMonitorAction::RemoveMonitor => "REMOVE_MONITOR",
        }
    }
}

impl fmt::Display for LagMonitorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The lifecycle operation for this action ran.
    Applied(LagMonitorAction),
    /// Store or version could not be resolved in time; nothing changed.
    NotReady,
}

pub struct MonitorUpdateDispatcher {
    topology: Arc<dyn TopologyAuthority>,
    lifecycle: Arc<dyn MonitorLifecycle>,
    max_wait: Duration,
}

impl MonitorUpdateDispatcher {
    pub fn new(
        topology: Arc<dyn TopologyAuthority>,
        lifecycle: Arc<dyn MonitorLifecycle>,
        max_wait: Duration,
    ) -> Self {
        Self {
            topology,
            lifecycle,
            max_wait,
        }
    }

    /// Apply `action` to `partition` of the store version named by
    /// `resource_name`.
    ///
    /// Only a malformed resource name is an error. An unresolved store or
    /// version is reported as [`DispatchOutcome::NotReady`], except for
    /// [`LagMonitorAction::RemoveMonitor`], which removes by name.
    pub async fn update_lag_monitor(
        &self,
        resource_name: &str,
        partition: PartitionId,
        action: LagMonitorAction,
    ) -> MonitorResult<DispatchOutcome> {
        let resource = ResourceName::parse(resource_name)?;

        let resolved = self.resolve(&resource).await;

        match (action, resolved) {
            (LagMonitorAction::RemoveMonitor, resolved) => {
                if resolved.is_none() {
                    debug!(
                        resource = %resource,
                        partition,
                        "Store version not resolved, removing lag monitor by name"
                    );
                }
                self.lifecycle.remove_monitor(&resource, partition);
            }
            (_, None) => {
                debug!(
                    resource = %resource,
                    partition,
                    action = %action,
                    "Store version not resolved, skipping lag monitor update"
                );
                return Ok(DispatchOutcome::NotReady);
            }
            (LagMonitorAction::SetLeaderMonitor, Some(version)) => {
                self.lifecycle.add_leader_monitor(&version, partition)
            }
            (LagMonitorAction::SetFollowerMonitor, Some(version)) => {
                self.lifecycle.add_follower_monitor(&version, partition)
            }
        }
        Ok(DispatchOutcome::Applied(action))
    }

    async fn resolve(&self, resource: &ResourceName) -> Option<VersionInfo> {
        let topology = &self.topology;
        let store = resource.store();
        let number = resource.version();
        let deadline = Instant::now() + self.max_wait;

        let lookup = (|| async move {
            let remaining = deadline.saturating_duration_since(Instant::now());
            topology.wait_version(store, number, remaining).await
        })
        .retry(retry::topology_policy())
        .when(MonitorError::is_transient)
        .notify(|err: &MonitorError, delay: Duration| {
            warn!(store, version = number, error = %err, ?delay, "Retrying topology lookup");
        });

        let result = match tokio::time::timeout(self.max_wait, lookup).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::TopologyTimeout {
                store: store.to_string(),
                version: number,
                waited: self.max_wait,
            }),
        };

        match result {
            Ok(info) => match info.resolved_version() {
                Some(version) => {
                    metrics::record_topology_lookup("resolved");
                    if let Some(store_info) = &info.store {
                        debug!(
                            store,
                            version = number,
                            current_version = store_info.current_version,
                            "Resolved store version"
                        );
                    }
                    Some(version.clone())
                }
                None => {
                    metrics::record_topology_lookup("missing");
                    None
                }
            },
            Err(err) => {
                metrics::record_topology_lookup(err.as_metric_label());
                warn!(store, version = number, error = %err, "Topology lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::mock_topology::MockTopology;
    use crate::monitor::topology::StoreInfo;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLifecycle {
        calls: Mutex<Vec<(&'static str, String, PartitionId)>>,
    }

    impl RecordingLifecycle {
        fn record(&self, call: &'static str, resource: &ResourceName, partition: PartitionId) {
            self.calls
                .lock()
                .unwrap()
                .push((call, resource.to_string(), partition));
        }

        fn calls(&self) -> Vec<(&'static str, String, PartitionId)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl MonitorLifecycle for RecordingLifecycle {
        fn add_leader_monitor(&self, version: &VersionInfo, partition: PartitionId) {
            self.record("leader", &version.resource_name(), partition);
        }

        fn add_follower_monitor(&self, version: &VersionInfo, partition: PartitionId) {
            self.record("follower", &version.resource_name(), partition);
        }

        fn remove_monitor(&self, resource: &ResourceName, partition: PartitionId) {
            self.record("remove", resource, partition);
        }
    }

    fn dispatcher(
        topology: Arc<MockTopology>,
        max_wait: Duration,
    ) -> (MonitorUpdateDispatcher, Arc<RecordingLifecycle>) {
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let dispatcher = MonitorUpdateDispatcher::new(topology, lifecycle.clone(), max_wait);
        (dispatcher, lifecycle)
    }

    #[tokio::test]
    async fn test_each_action_calls_matching_operation() {
        let topology = Arc::new(MockTopology::new());
        topology
            .add_version(VersionInfo::new("orders", 2).with_hybrid(true))
            .await;
        let (dispatcher, lifecycle) = dispatcher(topology, Duration::from_secs(1));

        for action in [
            LagMonitorAction::SetLeaderMonitor,
            LagMonitorAction::SetFollowerMonitor,
            LagMonitorAction::RemoveMonitor,
        ] {
            let outcome = dispatcher
                .update_lag_monitor("orders_v2", 3, action)
                .await
                .unwrap();
            assert_eq!(outcome, DispatchOutcome::Applied(action));
        }

        assert_eq!(
            lifecycle.calls(),
            vec![
                ("leader", "orders_v2".to_string(), 3),
                ("follower", "orders_v2".to_string(), 3),
                ("remove", "orders_v2".to_string(), 3),
            ]
        );
    }

    #[tokio::test]
    async fn test_unresolved_store_or_version_is_skipped() {
        let topology = Arc::new(MockTopology::new());
        topology.add_store(StoreInfo::new("orders", 1)).await;
        let (dispatcher, lifecycle) = dispatcher(topology, Duration::from_secs(1));

        let missing_version = dispatcher
            .update_lag_monitor("orders_v9", 0, LagMonitorAction::SetFollowerMonitor)
            .await
            .unwrap();
        let missing_store = dispatcher
            .update_lag_monitor("payments_v1", 0, LagMonitorAction::SetLeaderMonitor)
            .await
            .unwrap();

        assert_eq!(missing_version, DispatchOutcome::NotReady);
        assert_eq!(missing_store, DispatchOutcome::NotReady);
        assert!(lifecycle.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_falls_back_to_resource_name() {
        let topology = Arc::new(MockTopology::new());
        topology.add_store(StoreInfo::new("orders", 1)).await;
        let (dispatcher, lifecycle) = dispatcher(topology, Duration::from_secs(1));

        let deleted_version = dispatcher
            .update_lag_monitor("orders_v9", 2, LagMonitorAction::RemoveMonitor)
            .await
            .unwrap();
        let unknown_store = dispatcher
            .update_lag_monitor("payments_v1", 0, LagMonitorAction::RemoveMonitor)
            .await
            .unwrap();

        let applied = DispatchOutcome::Applied(LagMonitorAction::RemoveMonitor);
        assert_eq!(deleted_version, applied);
        assert_eq!(unknown_store, applied);
        assert_eq!(
            lifecycle.calls(),
            vec![
                ("remove", "orders_v9".to_string(), 2),
                ("remove", "payments_v1".to_string(), 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_resource_name_is_an_error() {
        let topology = Arc::new(MockTopology::new());
        let (dispatcher, lifecycle) = dispatcher(topology.clone(), Duration::from_secs(1));

        let err = dispatcher
            .update_lag_monitor("orders", 0, LagMonitorAction::SetLeaderMonitor)
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::InvalidResourceName { .. }));
        assert_eq!(topology.lookup_count(), 0);
        assert!(lifecycle.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let topology = Arc::new(MockTopology::new());
        topology
            .add_version(VersionInfo::new("orders", 2).with_hybrid(true))
            .await;
        topology.fail_next(2);
        let (dispatcher, lifecycle) = dispatcher(topology.clone(), Duration::from_secs(5));

        let outcome = dispatcher
            .update_lag_monitor("orders_v2", 0, LagMonitorAction::SetFollowerMonitor)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Applied(LagMonitorAction::SetFollowerMonitor)
        );
        assert_eq!(topology.lookup_count(), 3);
        assert_eq!(lifecycle.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_authority_times_out_as_not_ready() {
        let topology = Arc::new(MockTopology::new());
        topology
            .add_version(VersionInfo::new("orders", 2).with_hybrid(true))
            .await;
        topology.set_delay(Duration::from_secs(30));
        let (dispatcher, lifecycle) = dispatcher(topology, Duration::from_millis(200));

        let outcome = dispatcher
            .update_lag_monitor("orders_v2", 0, LagMonitorAction::SetLeaderMonitor)
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::NotReady);
        assert!(lifecycle.calls().is_empty());
    }
}
