//! Error types for the lag monitor.
//!
//! # Error Handling Patterns
//!
//! Two patterns are used depending on who is calling:
//!
//! ## Fail-Fast (Propagate Errors)
//!
//! - Configuration validation
//! - Resource name parsing
//! - Metric family registration
//!
//! ## Best-Effort (Log and Continue)
//!
//! - Heartbeats for partitions that are not monitored (dropped)
//! - Topology lookups that time out or return nothing (treated as "not ready")
//! - Lag computation over missing or unhealthy data (sentinel value)
//! - Stat reporting ticks

use std::time::Duration;

use thiserror::Error;

/// Result type for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors surfaced by the lag monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A resource name did not have the `<store>_v<version>` shape.
    #[error("Invalid resource name '{name}': {reason}")]
    InvalidResourceName { name: String, reason: &'static str },

    /// The topology authority failed while resolving a store version.
    #[error("Topology lookup for {store} v{version} failed: {message}")]
    Topology {
        store: String,
        version: i32,
        message: String,
    },

    /// The topology authority did not answer within the allowed wait.
    #[error("Topology lookup for {store} v{version} timed out after {waited:?}")]
    TopologyTimeout {
        store: String,
        version: i32,
        waited: Duration,
    },

    /// A metric family could not be registered (usually a duplicate name).
    #[error("Failed to register metric family '{name}': {source}")]
    MetricsRegistration {
        name: &'static str,
        #[source]
        source: prometheus::Error,
    },

    /// Configuration is invalid.
    #[error("Invalid configuration: {}", .0.join("; "))]
    Config(Vec<String>),
}

impl MonitorError {
    /// Returns true if retrying the operation may succeed.
    ///
    /// Only topology failures are retried; a timeout already consumed the
    /// whole wait budget.
    pub fn is_transient(&self) -> bool {
        matches!(self, MonitorError::Topology { .. })
    }

    /// Returns a short label for metrics.
    pub fn as_metric_label(&self) -> &'static str {
        match self {
            MonitorError::InvalidResourceName { .. } => "invalid_resource",
            MonitorError::Topology { .. } => "topology_error",
            MonitorError::TopologyTimeout { .. } => "topology_timeout",
            MonitorError::MetricsRegistration { .. } => "metrics_registration",
            MonitorError::Config(_) => "config",
        }
    }
}
