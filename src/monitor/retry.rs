//! Retry policies for topology resolution.
//!
//! | Policy | Min Delay | Max Delay | Retries | Use Case |
//! |--------|-----------|-----------|---------|----------|
//! | `topology_policy` | 20ms | 1s | 5 | Resolving store versions |
//!
//! Retries are additionally bounded by the dispatcher's overall wait budget,
//! so a slow authority never holds up a role change for longer than
//! `max_wait_for_version_info`.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Policy for topology lookups issued by the update dispatcher.
///
/// Only transient failures are retried; a lookup that answers "not found" is
/// a definitive answer and is not retried.
pub fn topology_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(20))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(5)
        .with_jitter()
}
