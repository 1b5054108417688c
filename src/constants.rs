//! Centralized constants for heartbeat lag monitoring.
//!
//! # Categories
//!
//! - **Naming Constants**: resource and region naming conventions
//! - **Lag Constants**: sentinel values and thresholds
//! - **Timing Constants**: default intervals and waits

// =============================================================================
// Naming Constants
// =============================================================================

/// Suffix appended to a region name to form its separate real-time topic variant.
///
/// `dc-1_sep` tracks heartbeat progress for `dc-1` over the isolated real-time
/// channel used by active-active versions that enable it.
pub const SEPARATE_TOPIC_SUFFIX: &str = "_sep";

/// Separator between store name and version number in a resource name
/// (`orders_v3`).
pub const VERSION_SEPARATOR: &str = "_v";

/// Separator between resource name and partition in a replica id
/// (`orders_v3-7`).
pub const REPLICA_SEPARATOR: char = '-';

/// Partition filter value meaning "every partition".
pub const ALL_PARTITIONS: i32 = -1;

// =============================================================================
// Lag Constants
// =============================================================================

/// Lag returned when the lag cannot be computed or a source is unhealthy.
///
/// Callers treat this as "unknown/critical".
pub const LAG_SENTINEL: i64 = i64::MAX;

/// Default lag above which a replica is reported by lagging-only queries.
pub const DEFAULT_LAGGING_THRESHOLD_MS: u64 = 10 * 60 * 1000;

// =============================================================================
// Timing Constants
// =============================================================================

/// Default interval between stat reporter ticks.
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 60_000;

/// Default maximum wait for the topology authority to expose a version.
pub const DEFAULT_MAX_WAIT_FOR_VERSION_MS: u64 = 5_000;

/// Number of stripes guarding role transitions.
///
/// Transitions for one (store, version, partition) always map to the same
/// stripe; unrelated partitions rarely share one.
pub const TRANSITION_LOCK_STRIPES: usize = 64;
