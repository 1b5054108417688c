//! Core identifiers shared across the monitor.
//!
//! Type aliases keep signatures self-describing, and [`ResourceName`] handles
//! the `<store>_v<version>` naming convention used by callers that only know a
//! resource by name.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::constants::{REPLICA_SEPARATOR, SEPARATE_TOPIC_SUFFIX, VERSION_SEPARATOR};
use crate::error::{MonitorError, MonitorResult};

/// Store version number.
pub type VersionNumber = i32;

/// Partition index within a store version.
pub type PartitionId = i32;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// Current wall-clock time in milliseconds.
pub fn current_time_millis() -> TimestampMs {
    chrono::Utc::now().timestamp_millis()
}

/// Returns true if `region` names a separate real-time topic variant.
pub fn is_separate_topic_region(region: &str) -> bool {
    region.ends_with(SEPARATE_TOPIC_SUFFIX)
}

/// Builds the separate real-time topic variant of `region`.
pub fn separate_topic_region(region: &str) -> String {
    format!("{region}{SEPARATE_TOPIC_SUFFIX}")
}

/// Replication role of a partition replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicaRole {
    /// Sources writes and fans them out to other regions.
    Leader,
    /// Consumes from a leader.
    Follower,
}

impl ReplicaRole {
    /// Label used in diagnostic records and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicaRole::Leader => "LEADER",
            ReplicaRole::Follower => "FOLLOWER",
        }
    }

    /// The opposite role.
    pub fn other(&self) -> ReplicaRole {
        match self {
            ReplicaRole::Leader => ReplicaRole::Follower,
            ReplicaRole::Follower => ReplicaRole::Leader,
        }
    }
}

impl fmt::Display for ReplicaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A store version addressed by name, e.g. `orders_v3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName {
    store: String,
    version: VersionNumber,
}

impl ResourceName {
    /// Create a resource name from its parts.
    pub fn new(store: impl Into<String>, version: VersionNumber) -> Self {
        Self {
            store: store.into(),
            version,
        }
    }

    /// Parse `<store>_v<version>`, splitting on the last `_v`.
    pub fn parse(name: &str) -> MonitorResult<Self> {
        let invalid = |reason| MonitorError::InvalidResourceName {
            name: name.to_string(),
            reason,
        };

        let (store, version) = name
            .rsplit_once(VERSION_SEPARATOR)
            .ok_or_else(|| invalid("missing version separator"))?;
        if store.is_empty() {
            return Err(invalid("empty store name"));
        }
        let version: VersionNumber = version
            .parse()
            .map_err(|_| invalid("version is not a number"))?;
        if version < 0 {
            return Err(invalid("version must be non-negative"));
        }

        Ok(Self::new(store, version))
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn version(&self) -> VersionNumber {
        self.version
    }

    /// Replica id of one partition of this resource, e.g. `orders_v3-7`.
    pub fn replica_id(&self, partition: PartitionId) -> String {
        format!("{self}{REPLICA_SEPARATOR}{partition}")
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.store, VERSION_SEPARATOR, self.version)
    }
}

impl FromStr for ResourceName {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_name() {
        let name = ResourceName::parse("orders_v3").unwrap();
        assert_eq!(name.store(), "orders");
        assert_eq!(name.version(), 3);
        assert_eq!(name.to_string(), "orders_v3");
    }

    #[test]
    fn test_parse_splits_on_last_separator() {
        let name: ResourceName = "my_vault_v12".parse().unwrap();
        assert_eq!(name.store(), "my_vault");
        assert_eq!(name.version(), 12);
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        assert!(ResourceName::parse("orders").is_err());
        assert!(ResourceName::parse("_v3").is_err());
        assert!(ResourceName::parse("orders_vx").is_err());
        assert!(ResourceName::parse("orders_v-1").is_err());
    }

    #[test]
    fn test_replica_id() {
        assert_eq!(ResourceName::new("orders", 3).replica_id(7), "orders_v3-7");
    }

    #[test]
    fn test_separate_topic_region_helpers() {
        assert_eq!(separate_topic_region("dc-1"), "dc-1_sep");
        assert!(is_separate_topic_region("dc-1_sep"));
        assert!(!is_separate_topic_region("dc-1"));
    }

    #[test]
    fn test_role_labels() {
        assert_eq!(ReplicaRole::Leader.as_str(), "LEADER");
        assert_eq!(ReplicaRole::Follower.to_string(), "FOLLOWER");
        assert_eq!(ReplicaRole::Leader.other(), ReplicaRole::Follower);
    }
}
