//! Tests for the metrics module.
//!
//! Operational counters live on the process-wide registry; tests touching it
//! are serialized. Lag gauge tests use private registries.

use std::sync::Arc;

use lagwatch::error::MonitorError;
use lagwatch::monitor::metrics::{self, LEADER_LAG_METRIC};
use lagwatch::monitor::{
    HeartbeatEntry, LagLedger, LagMetricKind, LagMetrics, StatReporter,
};
use lagwatch::types::ReplicaRole;
use prometheus::Registry;
use serial_test::serial;

fn regions(names: &[&str]) -> Arc<[Arc<str>]> {
    names.iter().map(|r| Arc::from(*r)).collect()
}

#[test]
fn test_lag_families_register_once_per_registry() {
    let registry = Registry::new();
    assert!(LagMetrics::register(&registry).is_ok());

    match LagMetrics::register(&registry) {
        Err(MonitorError::MetricsRegistration { name, .. }) => assert_eq!(name, LEADER_LAG_METRIC),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("duplicate registration must fail"),
    }
}

#[test]
fn test_reporter_output_is_exported() {
    let registry = Registry::new();
    let reporter = StatReporter::new(
        LagMetrics::register(&registry).unwrap(),
        regions(&["dc-0", "dc-0_sep"]),
    );
    let leader = LagLedger::new(ReplicaRole::Leader);
    let follower = LagLedger::new(ReplicaRole::Follower);
    leader.put("orders", 1, 0, "dc-0", HeartbeatEntry::seeded(1_000));

    reporter.report(&leader, &follower, 4_000);

    let families = registry.gather();
    let leader_family = families
        .iter()
        .find(|f| f.get_name() == LEADER_LAG_METRIC)
        .expect("leader family exported");
    let values: Vec<(String, i64)> = leader_family
        .get_metric()
        .iter()
        .map(|m| {
            let region = m
                .get_label()
                .iter()
                .find(|l| l.get_name() == "region")
                .map(|l| l.get_value().to_string())
                .unwrap_or_default();
            (region, m.get_gauge().get_value() as i64)
        })
        .collect();

    assert!(values.contains(&("dc-0".to_string(), 3_000)));
    assert!(values.contains(&("dc-0_sep".to_string(), 0)));
}

#[test]
fn test_follower_family_has_no_separate_topic_gauges() {
    let registry = Registry::new();
    let reporter = StatReporter::new(
        LagMetrics::register(&registry).unwrap(),
        regions(&["dc-0", "dc-0_sep"]),
    );
    let store = reporter.reporter_for("orders");

    for kind in LagMetricKind::ALL {
        let expected = kind != LagMetricKind::Follower;
        assert_eq!(store.has_gauge(kind, "dc-0_sep"), expected, "{kind:?}");
        assert!(store.has_gauge(kind, "dc-0"));
    }
}

#[test]
#[serial]
fn test_operational_metrics_are_encoded() {
    metrics::init_metrics();
    metrics::record_heartbeat("LEADER", true);
    metrics::record_heartbeat("FOLLOWER", false);
    metrics::record_monitor_transition("LEADER", true);
    metrics::record_topology_lookup("resolved");
    metrics::set_monitored_partitions("LEADER", 3);

    let output = metrics::encode_metrics().unwrap();
    for name in [
        "lagwatch_heartbeats_recorded_total",
        "lagwatch_heartbeats_discarded_total",
        "lagwatch_monitor_transitions_total",
        "lagwatch_topology_lookups_total",
        "lagwatch_monitored_partitions",
    ] {
        assert!(output.contains(name), "missing {name}");
    }
}

#[test]
#[serial]
fn test_global_lag_metrics_are_gathered() {
    let global = LagMetrics::global().unwrap();
    global
        .gauge(LagMetricKind::Leader, "metrics-test", "dc-0")
        .set(11);

    let gathered = metrics::gather_metrics();
    assert!(
        gathered
            .iter()
            .any(|f| f.get_name() == format!("lagwatch_{LEADER_LAG_METRIC}"))
    );
}
