//! # lagwatch
//! Heartbeat-based replication lag monitoring for partitioned, multi-region
//! stores.
//!
//! Every partition replica of a store version is either a leader or a
//! follower. Ingestion workers report per-region heartbeats; lagwatch keeps the
//! latest heartbeat per (store, version, partition, region), computes
//! replication lag on demand, answers diagnostic queries and publishes lag
//! gauges to Prometheus.
//!
//! ## Getting started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lagwatch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> MonitorResult<()> {
//!     lagwatch::telemetry::init_logging(lagwatch::telemetry::LogFormat::from_env())
//!         .map_err(|e| MonitorError::Config(vec![e.to_string()]))?;
//!
//!     let topology = Arc::new(MockTopology::new());
//!     topology.add_version(VersionInfo::new("orders", 3).with_hybrid(true)).await;
//!
//!     let service = Arc::new(HeartbeatMonitoringService::new(
//!         MonitorConfig::from_env()?,
//!         topology,
//!     )?);
//!     service
//!         .update_lag_monitor("orders_v3", 0, LagMonitorAction::SetFollowerMonitor)
//!         .await?;
//!
//!     let mut tasks = BackgroundTaskRegistry::new();
//!     service.spawn_reporting(&mut tasks);
//!     tokio::time::sleep(std::time::Duration::from_secs(300)).await;
//!     tasks.shutdown_all().await;
//!     Ok(())
//! }
//! ```
//!
//! Production deployments implement [`TopologyAuthority`](monitor::TopologyAuthority)
//! over their metadata repository instead of using the in-memory mock.

#![forbid(unsafe_code)]

pub mod constants;
pub mod error;
pub mod monitor;
pub mod telemetry;
pub mod types;

pub mod prelude {
    //! Commonly used types.
    pub use crate::constants::{ALL_PARTITIONS, LAG_SENTINEL};
    pub use crate::error::{MonitorError, MonitorResult};
    pub use crate::monitor::{
        BackgroundTaskRegistry, DispatchOutcome, HeartbeatEntry, HeartbeatMonitoringService,
        LagMonitorAction, MockTopology, MonitorConfig, MonitorLifecycle, ReplicaHeartbeatInfo,
        StoreInfo, StoreVersionInfo, TopologyAuthority, VersionInfo,
    };
    pub use crate::types::{PartitionId, ReplicaRole, ResourceName, TimestampMs, VersionNumber};
}
