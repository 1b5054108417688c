//! Heartbeat monitoring service.
//!
//! [`HeartbeatMonitoringService`] ties the pieces together: it owns both
//! ledgers, the lifecycle manager, the query engine, the stat reporter and
//! the update dispatcher, and exposes the inbound interface used by
//! ingestion workers and role-change notifications.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lagwatch::monitor::{
//!     BackgroundTaskRegistry, HeartbeatMonitoringService, LagMonitorAction, MockTopology,
//!     MonitorConfig, VersionInfo,
//! };
//!
//! # async fn run() -> lagwatch::error::MonitorResult<()> {
//! let topology = Arc::new(MockTopology::new());
//! topology.add_version(VersionInfo::new("orders", 3).with_hybrid(true)).await;
//!
//! let config = MonitorConfig::with_regions(["dc-0", "dc-1"]);
//! let service = Arc::new(HeartbeatMonitoringService::new(config, topology)?);
//!
//! service.update_lag_monitor("orders_v3", 0, LagMonitorAction::SetLeaderMonitor).await?;
//! service.record_leader_heartbeat("orders", 3, 0, "dc-1", 1_700_000_000_000, true);
//!
//! let mut tasks = BackgroundTaskRegistry::new();
//! service.spawn_reporting(&mut tasks);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use super::background_tasks::BackgroundTaskRegistry;
use super::config::MonitorConfig;
use super::dispatcher::{DispatchOutcome, LagMonitorAction, MonitorUpdateDispatcher};
use super::entry::HeartbeatEntry;
use super::ledger::LagLedger;
use super::lifecycle::{LifecycleManager, MonitorLifecycle};
use super::metrics::{self, LagMetrics};
use super::query::{LagQueryEngine, ReplicaHeartbeatInfo};
use super::reporter::StatReporter;
use super::topology::{TopologyAuthority, VersionInfo};
use super::transition::TransitionLocks;
use crate::error::{MonitorError, MonitorResult};
use crate::types::{PartitionId, ReplicaRole, TimestampMs, VersionNumber, current_time_millis};

/// Name of the background task publishing lag gauges.
pub const STAT_REPORTER_TASK: &str = "heartbeat_stat_reporter";

/// Replication lag monitor for one process.
pub struct HeartbeatMonitoringService {
    config: MonitorConfig,
    leader: Arc<LagLedger>,
    follower: Arc<LagLedger>,
    locks: Arc<TransitionLocks>,
    lifecycle: Arc<LifecycleManager>,
    query: LagQueryEngine,
    reporter: StatReporter,
    dispatcher: MonitorUpdateDispatcher,
}

impl HeartbeatMonitoringService {
    /// Build a service publishing lag gauges on the global registry.
    pub fn new(config: MonitorConfig, topology: Arc<dyn TopologyAuthority>) -> MonitorResult<Self> {
        Self::with_metrics(config, topology, LagMetrics::global()?)
    }

    /// Build a service publishing lag gauges through `metrics`.
    pub fn with_metrics(
        config: MonitorConfig,
        topology: Arc<dyn TopologyAuthority>,
        metrics: LagMetrics,
    ) -> MonitorResult<Self> {
        config.validate().map_err(MonitorError::Config)?;

        let regions: Arc<[Arc<str>]> = config.region_names.iter().cloned().collect();
        let leader = Arc::new(LagLedger::new(ReplicaRole::Leader));
        let follower = Arc::new(LagLedger::new(ReplicaRole::Follower));
        let locks = Arc::new(TransitionLocks::default());
        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::clone(&leader),
            Arc::clone(&follower),
            Arc::clone(&regions),
            Arc::clone(&locks),
        ));
        let query = LagQueryEngine::new(
            Arc::clone(&leader),
            Arc::clone(&follower),
            Arc::clone(&locks),
            config.lagging_threshold_ms(),
        );
        let reporter = StatReporter::new(metrics, regions);
        let dispatcher = MonitorUpdateDispatcher::new(
            topology,
            Arc::clone(&lifecycle) as Arc<dyn MonitorLifecycle>,
            config.max_wait_for_version_info,
        );

        info!(
            regions = ?config.region_names,
            local_region = %config.local_region,
            "Heartbeat monitoring service created"
        );

        Ok(Self {
            config,
            leader,
            follower,
            locks,
            lifecycle,
            query,
            reporter,
            dispatcher,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn leader_ledger(&self) -> &LagLedger {
        &self.leader
    }

    pub fn follower_ledger(&self) -> &LagLedger {
        &self.follower
    }

    pub fn stat_reporter(&self) -> &StatReporter {
        &self.reporter
    }

    // ---------------------------------------------------------------------
    // Heartbeats
    // ---------------------------------------------------------------------

    /// Record a heartbeat received by a leader replica.
    ///
    /// `ready_to_serve` is the region's caught-up flag; the region is assumed
    /// available. Dropped unless the partition is monitored as leader.
    pub fn record_leader_heartbeat(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
        region: &str,
        timestamp: TimestampMs,
        ready_to_serve: bool,
    ) -> bool {
        self.record_heartbeat(
            ReplicaRole::Leader,
            store,
            version,
            partition,
            region,
            HeartbeatEntry::new(timestamp, true, ready_to_serve),
        )
    }

    /// Record a heartbeat received by a follower replica.
    pub fn record_follower_heartbeat(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
        region: &str,
        timestamp: TimestampMs,
        ready_to_serve: bool,
    ) -> bool {
        self.record_heartbeat(
            ReplicaRole::Follower,
            store,
            version,
            partition,
            region,
            HeartbeatEntry::new(timestamp, true, ready_to_serve),
        )
    }

    /// Replace the entry of one region with `entry`.
    ///
    /// Returns false, and writes nothing, when the partition is not monitored
    /// in `role`. A heartbeat racing a role change is applied either before
    /// the partition leaves `role` or not at all.
    pub fn record_heartbeat(
        &self,
        role: ReplicaRole,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
        region: &str,
        entry: HeartbeatEntry,
    ) -> bool {
        let ledger = match role {
            ReplicaRole::Leader => &self.leader,
            ReplicaRole::Follower => &self.follower,
        };
        let applied = {
            let _guard = self.locks.read(store, version, partition);
            ledger.update_existing(store, version, partition, region, entry)
        };
        if !applied {
            debug!(
                store,
                version,
                partition,
                region,
                role = %role,
                "Dropping heartbeat for unmonitored partition"
            );
        }
        metrics::record_heartbeat(role.as_str(), applied);
        applied
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    pub fn add_leader_lag_monitor(&self, version: &VersionInfo, partition: PartitionId) {
        self.lifecycle.add_leader_monitor(version, partition);
    }

    pub fn add_follower_lag_monitor(&self, version: &VersionInfo, partition: PartitionId) {
        self.lifecycle.add_follower_monitor(version, partition);
    }

    pub fn remove_lag_monitor(&self, version: &VersionInfo, partition: PartitionId) {
        self.lifecycle
            .remove_monitor(&version.resource_name(), partition);
    }

    /// Resolve `resource_name` and apply `action` to `partition`.
    pub async fn update_lag_monitor(
        &self,
        resource_name: &str,
        partition: PartitionId,
        action: LagMonitorAction,
    ) -> MonitorResult<DispatchOutcome> {
        self.dispatcher
            .update_lag_monitor(resource_name, partition, action)
            .await
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Role `partition` is monitored in, if any.
    pub fn monitored_role(
        &self,
        store: &str,
        version: VersionNumber,
        partition: PartitionId,
    ) -> Option<ReplicaRole> {
        self.query.monitored_role(store, version, partition)
    }

    /// Worst leader lag of a partition right now.
    pub fn leader_max_lag(&self, store: &str, version: VersionNumber, partition: PartitionId) -> i64 {
        self.query
            .leader_max_lag(store, version, partition, current_time_millis())
    }

    /// Follower lag of a partition in the local region right now.
    pub fn follower_lag(&self, store: &str, version: VersionNumber, partition: PartitionId) -> i64 {
        self.query.follower_lag(
            store,
            version,
            partition,
            &self.config.local_region,
            current_time_millis(),
        )
    }

    /// Diagnostic records for a resource; `partition_filter = -1` means all.
    pub fn get_heartbeat_info(
        &self,
        resource_name: &str,
        partition_filter: PartitionId,
        only_lagging: bool,
    ) -> MonitorResult<Vec<ReplicaHeartbeatInfo>> {
        self.query.get_heartbeat_info(
            resource_name,
            partition_filter,
            only_lagging,
            current_time_millis(),
        )
    }

    /// [`get_heartbeat_info`](Self::get_heartbeat_info) rendered as JSON.
    pub fn get_heartbeat_info_json(
        &self,
        resource_name: &str,
        partition_filter: PartitionId,
        only_lagging: bool,
    ) -> MonitorResult<serde_json::Value> {
        let records = self.get_heartbeat_info(resource_name, partition_filter, only_lagging)?;
        Ok(serde_json::json!({
            "resource": resource_name,
            "partition_filter": partition_filter,
            "only_lagging": only_lagging,
            "replicas": records,
        }))
    }

    // ---------------------------------------------------------------------
    // Reporting
    // ---------------------------------------------------------------------

    /// Publish lag gauges once.
    pub fn report(&self) {
        self.reporter
            .report(&self.leader, &self.follower, current_time_millis());
    }

    /// Run [`report`](Self::report) every `report_interval` on `tasks`.
    pub fn spawn_reporting(self: &Arc<Self>, tasks: &mut BackgroundTaskRegistry) {
        let service = Arc::clone(self);
        tasks.spawn_periodic(
            STAT_REPORTER_TASK,
            self.config.report_interval,
            move |tick| {
                let service = Arc::clone(&service);
                async move {
                    service.report();
                    debug!(tick, "Published heartbeat lag gauges");
                }
            },
        );
    }
}
