//! In-memory topology authority for testing.
//!
//! Stores and versions are registered up front; lookups answer from memory.
//! Call counts, injected failures and artificial delays make it possible to
//! exercise the dispatcher's retry and timeout paths without a real metadata
//! service.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::topology::{StoreInfo, StoreVersionInfo, TopologyAuthority, VersionInfo};
use crate::error::{MonitorError, MonitorResult};
use crate::types::VersionNumber;

/// In-memory [`TopologyAuthority`].
#[derive(Default)]
pub struct MockTopology {
    stores: RwLock<HashMap<Arc<str>, StoreInfo>>,
    versions: RwLock<HashMap<(Arc<str>, VersionNumber), VersionInfo>>,
    lookups: AtomicU64,
    failures_remaining: AtomicU32,
    delay_ms: AtomicU64,
}

impl MockTopology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store.
    pub async fn add_store(&self, store: StoreInfo) {
        self.stores
            .write()
            .await
            .insert(Arc::clone(&store.name), store);
    }

    /// Register a version, and its store if it is not known yet.
    pub async fn add_version(&self, version: VersionInfo) {
        let store: Arc<str> = Arc::from(version.store_name());
        self.stores
            .write()
            .await
            .entry(Arc::clone(&store))
            .or_insert_with(|| StoreInfo::new(Arc::clone(&store), version.number()));
        self.versions
            .write()
            .await
            .insert((store, version.number()), version);
    }

    /// Forget a version, leaving its store registered.
    pub async fn remove_version(&self, store: &str, version: VersionNumber) {
        let key: (Arc<str>, VersionNumber) = (Arc::from(store), version);
        self.versions.write().await.remove(&key);
    }

    /// Fail the next `count` lookups with a transient topology error.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Sleep this long inside every lookup.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of lookups served so far, including failed ones.
    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopologyAuthority for MockTopology {
    async fn wait_version(
        &self,
        store: &str,
        version: VersionNumber,
        _timeout: Duration,
    ) -> MonitorResult<StoreVersionInfo> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(MonitorError::Topology {
                store: store.to_string(),
                version,
                message: "injected failure".to_string(),
            });
        }

        let key: (Arc<str>, VersionNumber) = (Arc::from(store), version);
        let store_info = self.stores.read().await.get(store).cloned();
        let version_info = self.versions.read().await.get(&key).cloned();
        Ok(StoreVersionInfo::new(store_info, version_info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_registered_version() {
        let topology = MockTopology::new();
        topology
            .add_version(VersionInfo::new("orders", 2).with_hybrid(true))
            .await;

        let info = topology
            .wait_version("orders", 2, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(info.store.is_some());
        assert_eq!(info.version.unwrap().number(), 2);
        assert_eq!(topology.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_lookup_unknown_version_returns_store_only() {
        let topology = MockTopology::new();
        topology.add_store(StoreInfo::new("orders", 1)).await;

        let info = topology
            .wait_version("orders", 9, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(info.store.is_some());
        assert!(info.version.is_none());
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let topology = MockTopology::new();
        topology.fail_next(2);

        assert!(topology.wait_version("orders", 1, Duration::ZERO).await.is_err());
        assert!(topology.wait_version("orders", 1, Duration::ZERO).await.is_err());
        assert!(topology.wait_version("orders", 1, Duration::ZERO).await.is_ok());
        assert_eq!(topology.lookup_count(), 3);
    }

    #[tokio::test]
    async fn test_remove_version() {
        let topology = MockTopology::new();
        topology.add_version(VersionInfo::new("orders", 1)).await;
        topology.remove_version("orders", 1).await;

        let info = topology
            .wait_version("orders", 1, Duration::ZERO)
            .await
            .unwrap();
        assert!(info.store.is_some());
        assert!(info.version.is_none());
    }
}
