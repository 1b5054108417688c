//! Last-known heartbeat state for one region of one partition.

use crate::types::TimestampMs;

/// Heartbeat state reported for one region of one partition replica.
///
/// Entries are values: a heartbeat replaces the whole entry rather than
/// patching individual fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatEntry {
    /// Producer-side time the heartbeat represents.
    pub timestamp: TimestampMs,
    /// Whether the source region reports itself reachable.
    pub region_available: bool,
    /// Whether this region's replica finished catching up and can be trusted
    /// as a source of truth for lag.
    pub caught_up: bool,
}

impl HeartbeatEntry {
    pub fn new(timestamp: TimestampMs, region_available: bool, caught_up: bool) -> Self {
        Self {
            timestamp,
            region_available,
            caught_up,
        }
    }

    /// Entry used when a monitor is added for a region with no history.
    pub fn seeded(timestamp: TimestampMs) -> Self {
        Self::new(timestamp, true, true)
    }

    /// Available and caught up.
    pub fn is_healthy(&self) -> bool {
        self.region_available && self.caught_up
    }

    /// Milliseconds between this heartbeat and `now`.
    ///
    /// Heartbeats stamped in the future (clock skew) report zero lag.
    pub fn lag_at(&self, now: TimestampMs) -> i64 {
        now.saturating_sub(self.timestamp).max(0)
    }
}
