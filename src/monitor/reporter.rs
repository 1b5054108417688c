//! Periodic lag gauges per store and region.
//!
//! Each store gets one [`HeartbeatStatReporter`] the first time it is seen.
//! The reporter owns the gauges of that store: leader and catching-up follower
//! gauges exist for every configured region, `_sep` variants included, while
//! follower gauges exist only for plain regions. A tick walks both ledgers,
//! takes the maximum lag per (store, family, region) and publishes it. Gauges
//! that saw no data during the tick go back to zero. Once a store leaves both
//! ledgers its reporter is retired and its gauges are removed from the
//! families; the store gets a fresh reporter if it comes back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::ledger::LagLedger;
use super::metrics::{self, LagMetricKind, LagMetrics};
use crate::types::{ReplicaRole, TimestampMs, is_separate_topic_region};

/// Gauges of one store.
pub struct HeartbeatStatReporter {
    store: Arc<str>,
    metrics: LagMetrics,
    regions: HashMap<LagMetricKind, Vec<Arc<str>>>,
}

impl HeartbeatStatReporter {
    /// Create the store's gauges, initialised to zero.
    pub fn new(store: Arc<str>, metrics: LagMetrics, configured: &[Arc<str>]) -> Self {
        let mut regions = HashMap::new();
        for kind in LagMetricKind::ALL {
            let selected: Vec<Arc<str>> = configured
                .iter()
                .filter(|region| kind != LagMetricKind::Follower || !is_separate_topic_region(region))
                .cloned()
                .collect();
            for region in &selected {
                metrics.gauge(kind, &store, region).set(0);
            }
            regions.insert(kind, selected);
        }
        Self {
            store,
            metrics,
            regions,
        }
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    /// Whether a gauge exists for `region` in the `kind` family.
    pub fn has_gauge(&self, kind: LagMetricKind, region: &str) -> bool {
        self.regions
            .get(&kind)
            .is_some_and(|regions| regions.iter().any(|r| r.as_ref() == region))
    }

    /// Publish one tick of maxima. Registered gauges absent from `max_lag`
    /// are reset to zero; entries for unregistered regions are ignored.
    pub fn publish(&self, max_lag: &HashMap<(LagMetricKind, Arc<str>), i64>) {
        for (kind, regions) in &self.regions {
            for region in regions {
                let value = max_lag
                    .get(&(*kind, Arc::clone(region)))
                    .copied()
                    .unwrap_or(0);
                self.metrics.gauge(*kind, &self.store, region).set(value);
            }
        }
    }

    /// Remove every gauge of this store from its family.
    pub fn retire(&self) {
        for (kind, regions) in &self.regions {
            for region in regions {
                self.metrics.remove(*kind, &self.store, region);
            }
        }
    }

    /// Current value of a gauge, if it exists.
    pub fn gauge_value(&self, kind: LagMetricKind, region: &str) -> Option<i64> {
        self.has_gauge(kind, region)
            .then(|| self.metrics.gauge(kind, &self.store, region).get())
    }
}

/// Walks the ledgers and feeds per-store reporters.
pub struct StatReporter {
    metrics: LagMetrics,
    regions: Arc<[Arc<str>]>,
    reporters: DashMap<Arc<str>, Arc<HeartbeatStatReporter>>,
}

impl StatReporter {
    pub fn new(metrics: LagMetrics, regions: Arc<[Arc<str>]>) -> Self {
        Self {
            metrics,
            regions,
            reporters: DashMap::new(),
        }
    }

    /// Reporter of `store`, created exactly once.
    pub fn reporter_for(&self, store: &str) -> Arc<HeartbeatStatReporter> {
        if let Some(existing) = self.reporters.get(store) {
            return Arc::clone(existing.value());
        }
        let reporter = self
            .reporters
            .entry(Arc::from(store))
            .or_insert_with(|| {
                debug!(store, "Creating heartbeat stat reporter");
                Arc::new(HeartbeatStatReporter::new(
                    Arc::from(store),
                    self.metrics.clone(),
                    &self.regions,
                ))
            });
        Arc::clone(reporter.value())
    }

    /// Reporter of `store`, if one was created.
    pub fn get(&self, store: &str) -> Option<Arc<HeartbeatStatReporter>> {
        self.reporters.get(store).map(|r| Arc::clone(r.value()))
    }

    pub fn reporter_count(&self) -> usize {
        self.reporters.len()
    }

    /// Run one reporting tick at time `now`.
    pub fn report(&self, leader: &LagLedger, follower: &LagLedger, now: TimestampMs) {
        let mut stores: HashSet<Arc<str>> = leader.stores().into_iter().collect();
        stores.extend(follower.stores());

        let retired: Vec<Arc<str>> = self
            .reporters
            .iter()
            .map(|r| Arc::clone(r.key()))
            .filter(|store| !stores.contains(store))
            .collect();
        for store in retired {
            if let Some((_, reporter)) = self.reporters.remove(&store) {
                reporter.retire();
                debug!(store = %store, "Retired heartbeat stat reporter");
            }
        }

        let mut partitions = [0usize; 2];
        for store in stores {
            let mut max_lag: HashMap<(LagMetricKind, Arc<str>), i64> = HashMap::new();

            for (role, ledger) in [(ReplicaRole::Leader, leader), (ReplicaRole::Follower, follower)] {
                let mut seen = HashSet::new();
                for row in ledger.snapshot(&store) {
                    seen.insert((row.version, row.partition));
                    let kind = match role {
                        ReplicaRole::Leader => LagMetricKind::Leader,
                        ReplicaRole::Follower if row.entry.caught_up => LagMetricKind::Follower,
                        ReplicaRole::Follower => LagMetricKind::CatchingUpFollower,
                    };
                    let lag = row.entry.lag_at(now);
                    max_lag
                        .entry((kind, row.region))
                        .and_modify(|max| *max = (*max).max(lag))
                        .or_insert(lag);
                }
                partitions[role as usize] += seen.len();
            }

            self.reporter_for(&store).publish(&max_lag);
        }

        metrics::set_monitored_partitions(ReplicaRole::Leader.as_str(), partitions[0]);
        metrics::set_monitored_partitions(ReplicaRole::Follower.as_str(), partitions[1]);
    }
}
