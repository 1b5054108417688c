//! Heartbeat-based replication lag monitoring.
//!
//! # Architecture
//!
//! ```text
//!   ingestion workers            role-change notifications
//!          │                                │
//!          │ record_*_heartbeat             │ update_lag_monitor
//!          ▼                                ▼
//!   ┌─────────────┐   add/remove   ┌──────────────────┐   wait_version   ┌──────────┐
//!   │ Lag ledgers │◄───────────────│ Update dispatcher│─────────────────►│ Topology │
//!   │ leader  ┃   │  (lifecycle)   └──────────────────┘                  └──────────┘
//!   │ follower┃   │
//!   └──────┬──────┘
//!          │ snapshot / lookups
//!    ┌─────┴──────────────┐
//!    ▼                    ▼
//! ┌──────────────┐  ┌──────────────┐
//! │ Query engine │  │ Stat reporter│──► prometheus gauges
//! └──────────────┘  └──────────────┘
//! ```
//!
//! A partition is monitored in at most one role at a time. Heartbeats for
//! partitions that are not monitored in the reported role are dropped.

pub mod background_tasks;
mod config;
mod dispatcher;
mod entry;
mod ledger;
mod lifecycle;
pub mod metrics;
pub mod mock_topology;
mod query;
mod reporter;
pub mod retry;
mod service;
mod topology;
mod transition;

pub use background_tasks::{BackgroundTaskRegistry, TaskStatus};
pub use config::MonitorConfig;
pub use dispatcher::{DispatchOutcome, LagMonitorAction, MonitorUpdateDispatcher};
pub use entry::HeartbeatEntry;
pub use ledger::{LagLedger, LedgerRow};
pub use lifecycle::{LifecycleManager, MonitorLifecycle};
pub use metrics::{LagMetricKind, LagMetrics};
pub use mock_topology::MockTopology;
pub use query::{LagQueryEngine, ReplicaHeartbeatInfo};
pub use reporter::{HeartbeatStatReporter, StatReporter};
pub use service::{HeartbeatMonitoringService, STAT_REPORTER_TASK};
pub use topology::{StoreInfo, StoreVersionInfo, TopologyAuthority, VersionInfo};
pub use transition::TransitionLocks;
