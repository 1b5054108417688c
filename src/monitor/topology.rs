//! Topology authority seam.
//!
//! The monitor never decides on its own which store versions exist. It asks a
//! [`TopologyAuthority`] to resolve a store name and version number into
//! metadata, and only monitors what comes back.
//!
//! # Available Implementations
//!
//! - [`MockTopology`](super::mock_topology::MockTopology): in-memory, for tests
//!   and demos
//!
//! Production deployments implement the trait on top of their metadata
//! repository.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::MonitorResult;
use crate::types::{ResourceName, VersionNumber};

/// Metadata of one store version, as far as lag monitoring cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    store_name: Arc<str>,
    number: VersionNumber,
    hybrid: bool,
    active_active: bool,
    separate_real_time_topic: bool,
}

impl VersionInfo {
    /// A batch-only version with every replication flag off.
    pub fn new(store_name: impl Into<Arc<str>>, number: VersionNumber) -> Self {
        Self {
            store_name: store_name.into(),
            number,
            hybrid: false,
            active_active: false,
            separate_real_time_topic: false,
        }
    }

    pub fn with_hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = hybrid;
        self
    }

    pub fn with_active_active(mut self, active_active: bool) -> Self {
        self.active_active = active_active;
        self
    }

    pub fn with_separate_real_time_topic(mut self, enabled: bool) -> Self {
        self.separate_real_time_topic = enabled;
        self
    }

    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    pub fn number(&self) -> VersionNumber {
        self.number
    }

    /// Accepts both batch and real-time writes. Only hybrid versions are
    /// lag-monitored.
    pub fn is_hybrid(&self) -> bool {
        self.hybrid
    }

    pub fn is_active_active(&self) -> bool {
        self.active_active
    }

    pub fn is_separate_real_time_topic_enabled(&self) -> bool {
        self.separate_real_time_topic
    }

    /// Whether `_sep` region variants should be monitored for this version.
    pub fn tracks_separate_topic_regions(&self) -> bool {
        self.active_active && self.separate_real_time_topic
    }

    pub fn resource_name(&self) -> ResourceName {
        ResourceName::new(self.store_name.as_ref(), self.number)
    }
}

/// Store-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
    pub name: Arc<str>,
    pub current_version: VersionNumber,
}

impl StoreInfo {
    pub fn new(name: impl Into<Arc<str>>, current_version: VersionNumber) -> Self {
        Self {
            name: name.into(),
            current_version,
        }
    }
}

/// Result of a topology lookup. Either half may be missing when the store or
/// version is not (yet) visible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreVersionInfo {
    pub store: Option<StoreInfo>,
    pub version: Option<VersionInfo>,
}

impl StoreVersionInfo {
    pub fn new(store: Option<StoreInfo>, version: Option<VersionInfo>) -> Self {
        Self { store, version }
    }

    /// Nothing resolved.
    pub fn missing() -> Self {
        Self::default()
    }

    /// The version, only if both halves resolved.
    pub fn resolved_version(&self) -> Option<&VersionInfo> {
        match (&self.store, &self.version) {
            (Some(_), Some(version)) => Some(version),
            _ => None,
        }
    }
}

/// Resolves store versions to metadata.
#[async_trait]
pub trait TopologyAuthority: Send + Sync {
    /// Wait up to `timeout` for `store` version `version` to become visible.
    ///
    /// Implementations return whatever they know once the wait elapses rather
    /// than failing; errors are reserved for genuine lookup failures.
    async fn wait_version(
        &self,
        store: &str,
        version: VersionNumber,
        timeout: Duration,
    ) -> MonitorResult<StoreVersionInfo>;
}
