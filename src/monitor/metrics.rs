//! Prometheus metrics for the heartbeat monitor.
//!
//! Two kinds of metrics live here:
//! - Operational counters about the monitor itself (discarded heartbeats,
//!   monitor transitions, topology lookups). These are process-wide statics.
//! - Lag gauge families (`leader_heartbeat_delay_ms`,
//!   `follower_heartbeat_delay_ms`, `catching_up_follower_heartbeat_delay_ms`),
//!   labelled by `store` and `region`. These are held in a [`LagMetrics`] value
//!   so tests can register them on a private [`Registry`].
//!
//! # Safety
//!
//! All metrics are registered to a custom registry with the "lagwatch" prefix
//! to avoid name collisions with other libraries using the default Prometheus
//! registry. Counter registration failures fall back to an unregistered
//! metric; lag family registration is exactly-once and reports collisions as
//! [`MonitorError::MetricsRegistration`].

use once_cell::sync::{Lazy, OnceCell};
use prometheus::{
    Encoder, IntCounterVec, IntGauge, IntGaugeVec, Registry, TextEncoder, opts,
};
use tracing::warn;

use crate::error::{MonitorError, MonitorResult};

/// Custom Prometheus registry for lagwatch metrics.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("lagwatch".to_string()), None).unwrap_or_else(|_| Registry::new())
});

/// Declare an IntCounterVec metric with labels.
macro_rules! define_counter_vec {
    ($name:ident, $metric_name:expr, $help:expr, [$($label:expr),+ $(,)?]) => {
        #[doc = $help]
        pub static $name: Lazy<IntCounterVec> = Lazy::new(|| {
            register_int_counter_vec_safe(&REGISTRY, $metric_name, $help, &[$($label),+])
        });
    };
}

/// Declare an IntGaugeVec metric with labels.
macro_rules! define_gauge_vec {
    ($name:ident, $metric_name:expr, $help:expr, [$($label:expr),+ $(,)?]) => {
        #[doc = $help]
        pub static $name: Lazy<IntGaugeVec> = Lazy::new(|| {
            register_int_gauge_vec_safe(&REGISTRY, $metric_name, $help, &[$($label),+])
        });
    };
}

// =============================================================================
// Operational metrics
// =============================================================================

define_counter_vec!(
    HEARTBEATS_RECORDED,
    "heartbeats_recorded_total",
    "Heartbeats applied to a monitored partition",
    ["role"]
);
define_counter_vec!(
    HEARTBEATS_DISCARDED,
    "heartbeats_discarded_total",
    "Heartbeats dropped because the partition is not monitored in that role",
    ["role"]
);
define_counter_vec!(
    MONITOR_TRANSITIONS,
    "monitor_transitions_total",
    "Lag monitor additions and removals",
    ["target", "switched_role"]
);
define_counter_vec!(
    TOPOLOGY_LOOKUPS,
    "topology_lookups_total",
    "Topology resolutions performed by the update dispatcher",
    ["status"]
);
define_gauge_vec!(
    MONITORED_PARTITIONS,
    "monitored_partitions",
    "Partitions currently monitored, per role",
    ["role"]
);

// =============================================================================
// Lag gauge families
// =============================================================================

pub const LEADER_LAG_METRIC: &str = "leader_heartbeat_delay_ms";
pub const FOLLOWER_LAG_METRIC: &str = "follower_heartbeat_delay_ms";
pub const CATCHING_UP_FOLLOWER_LAG_METRIC: &str = "catching_up_follower_heartbeat_delay_ms";

const LAG_LABELS: &[&str] = &["store", "region"];

/// Which lag gauge family a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LagMetricKind {
    Leader,
    Follower,
    /// Followers whose local replica has not caught up yet.
    CatchingUpFollower,
}

impl LagMetricKind {
    pub const ALL: [LagMetricKind; 3] = [
        LagMetricKind::Leader,
        LagMetricKind::Follower,
        LagMetricKind::CatchingUpFollower,
    ];

    pub fn metric_name(&self) -> &'static str {
        match self {
            LagMetricKind::Leader => LEADER_LAG_METRIC,
            LagMetricKind::Follower => FOLLOWER_LAG_METRIC,
            LagMetricKind::CatchingUpFollower => CATCHING_UP_FOLLOWER_LAG_METRIC,
        }
    }
}

/// The three lag gauge families, registered together.
///
/// Cloning is cheap; clones share the underlying families.
#[derive(Clone)]
pub struct LagMetrics {
    leader: IntGaugeVec,
    follower: IntGaugeVec,
    catching_up: IntGaugeVec,
}

impl LagMetrics {
    /// Register the three families on `registry`.
    ///
    /// Fails if any family is already registered there. Families registered
    /// before the failing one are unregistered again.
    pub fn register(registry: &Registry) -> MonitorResult<Self> {
        let leader = new_lag_family(LagMetricKind::Leader)?;
        let follower = new_lag_family(LagMetricKind::Follower)?;
        let catching_up = new_lag_family(LagMetricKind::CatchingUpFollower)?;

        let families = [
            (LagMetricKind::Leader, &leader),
            (LagMetricKind::Follower, &follower),
            (LagMetricKind::CatchingUpFollower, &catching_up),
        ];
        for (i, (kind, family)) in families.iter().enumerate() {
            if let Err(source) = registry.register(Box::new((*family).clone())) {
                for (_, registered) in &families[..i] {
                    let _ = registry.unregister(Box::new((*registered).clone()));
                }
                return Err(MonitorError::MetricsRegistration {
                    name: kind.metric_name(),
                    source,
                });
            }
        }

        Ok(Self {
            leader,
            follower,
            catching_up,
        })
    }

    /// Families registered on the process-wide [`REGISTRY`].
    ///
    /// Registration happens on first call; later calls share it.
    pub fn global() -> MonitorResult<Self> {
        static GLOBAL: OnceCell<LagMetrics> = OnceCell::new();
        GLOBAL
            .get_or_try_init(|| LagMetrics::register(&REGISTRY))
            .cloned()
    }

    fn family(&self, kind: LagMetricKind) -> &IntGaugeVec {
        match kind {
            LagMetricKind::Leader => &self.leader,
            LagMetricKind::Follower => &self.follower,
            LagMetricKind::CatchingUpFollower => &self.catching_up,
        }
    }

    /// Gauge for one (store, region) pair, created on first use.
    pub fn gauge(&self, kind: LagMetricKind, store: &str, region: &str) -> IntGauge {
        self.family(kind).with_label_values(&[store, region])
    }

    /// Drop a (store, region) gauge from its family.
    pub fn remove(&self, kind: LagMetricKind, store: &str, region: &str) {
        let _ = self.family(kind).remove_label_values(&[store, region]);
    }
}

fn new_lag_family(kind: LagMetricKind) -> MonitorResult<IntGaugeVec> {
    let help = match kind {
        LagMetricKind::Leader => "Maximum heartbeat delay observed by leader replicas, in ms",
        LagMetricKind::Follower => "Maximum heartbeat delay observed by caught-up followers, in ms",
        LagMetricKind::CatchingUpFollower => {
            "Maximum heartbeat delay observed by followers still catching up, in ms"
        }
    };
    IntGaugeVec::new(opts!(kind.metric_name(), help), LAG_LABELS).map_err(|source| {
        MonitorError::MetricsRegistration {
            name: kind.metric_name(),
            source,
        }
    })
}

// =============================================================================
// Registration helpers
// =============================================================================

/// Register an IntCounterVec safely, returning a fallback on error.
fn register_int_counter_vec_safe(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> IntCounterVec {
    let counter =
        IntCounterVec::new(opts!(name, help), labels).expect("metric opts should be valid");
    match registry.register(Box::new(counter.clone())) {
        Ok(()) => counter,
        Err(e) => {
            warn!(name, error = %e, "Failed to register IntCounterVec metric, using unregistered fallback");
            counter
        }
    }
}

/// Register an IntGaugeVec safely, returning a fallback on error.
fn register_int_gauge_vec_safe(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> IntGaugeVec {
    let gauge = IntGaugeVec::new(opts!(name, help), labels).expect("metric opts should be valid");
    match registry.register(Box::new(gauge.clone())) {
        Ok(()) => gauge,
        Err(e) => {
            warn!(name, error = %e, "Failed to register IntGaugeVec metric, using unregistered fallback");
            gauge
        }
    }
}

/// Force registration of every operational metric.
///
/// Idempotent. Lag families are registered separately through
/// [`LagMetrics::global`].
pub fn init_metrics() {
    let _ = &*HEARTBEATS_RECORDED;
    let _ = &*HEARTBEATS_DISCARDED;
    let _ = &*MONITOR_TRANSITIONS;
    let _ = &*TOPOLOGY_LOOKUPS;
    let _ = &*MONITORED_PARTITIONS;
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Gather all metric families from the registry.
pub fn gather_metrics() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

pub fn record_heartbeat(role: &str, applied: bool) {
    if applied {
        HEARTBEATS_RECORDED.with_label_values(&[role]).inc();
    } else {
        HEARTBEATS_DISCARDED.with_label_values(&[role]).inc();
    }
}

/// Record a monitor addition (`target` is the role) or removal.
pub fn record_monitor_transition(target: &str, switched_role: bool) {
    let switched = if switched_role { "true" } else { "false" };
    MONITOR_TRANSITIONS
        .with_label_values(&[target, switched])
        .inc();
}

/// Record the outcome of a topology lookup.
pub fn record_topology_lookup(status: &str) {
    TOPOLOGY_LOOKUPS.with_label_values(&[status]).inc();
}

pub fn set_monitored_partitions(role: &str, count: usize) {
    MONITORED_PARTITIONS
        .with_label_values(&[role])
        .set(count as i64);
}
