//! Heartbeat monitor demo.
//!
//! Simulates a hybrid store with a handful of partitions across three regions:
//! role changes arrive through the update dispatcher, a background loop feeds
//! heartbeats (one region deliberately stale), and the stat reporter publishes
//! gauges on a short interval.
//!
//! ## Running
//!
//! ```bash
//! cargo run --example monitor
//! ```
//!
//! With JSON logging and a custom region set:
//! ```bash
//! LOG_FORMAT=json RUST_LOG=debug \
//! LAGWATCH_REGIONS=dc-0,dc-1,dc-2,dc-1_sep LAGWATCH_REPORT_INTERVAL_MS=1000 \
//! cargo run --example monitor
//! ```

use std::sync::Arc;
use std::time::Duration;

use lagwatch::monitor::metrics;
use lagwatch::prelude::*;
use lagwatch::telemetry::{LogFormat, init_logging};
use tracing::info;

const STORE: &str = "orders";
const VERSION: VersionNumber = 3;
const PARTITIONS: PartitionId = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging(LogFormat::from_env())?;

    let mut config = MonitorConfig::from_env()?;
    if config.region_names.len() == 1 {
        config = MonitorConfig::with_regions(["dc-0", "dc-1", "dc-2", "dc-1_sep"])
            .report_interval(Duration::from_secs(1));
    }
    let regions = config.region_names.clone();

    let topology = Arc::new(MockTopology::new());
    topology
        .add_version(
            VersionInfo::new(STORE, VERSION)
                .with_hybrid(true)
                .with_active_active(true)
                .with_separate_real_time_topic(true),
        )
        .await;

    metrics::init_metrics();
    let service = Arc::new(HeartbeatMonitoringService::new(config, topology)?);
    let resource = ResourceName::new(STORE, VERSION).to_string();

    for partition in 0..PARTITIONS {
        let action = if partition == 0 {
            LagMonitorAction::SetLeaderMonitor
        } else {
            LagMonitorAction::SetFollowerMonitor
        };
        let outcome = service
            .update_lag_monitor(&resource, partition, action)
            .await?;
        info!(partition, ?outcome, "Applied role");
    }

    let mut tasks = BackgroundTaskRegistry::new();
    service.spawn_reporting(&mut tasks);

    let feeder = Arc::clone(&service);
    tasks.spawn_periodic("heartbeat_feeder", Duration::from_millis(200), move |_| {
        let service = Arc::clone(&feeder);
        let regions = regions.clone();
        async move {
            let now = lagwatch::types::current_time_millis();
            for partition in 0..PARTITIONS {
                for region in regions.iter() {
                    // dc-2 stops making progress after startup.
                    if region.as_ref() == "dc-2" {
                        continue;
                    }
                    if partition == 0 {
                        service.record_leader_heartbeat(STORE, VERSION, partition, region, now, true);
                    } else {
                        service.record_follower_heartbeat(STORE, VERSION, partition, region, now, true);
                    }
                }
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(3)).await;

    // Promote partition 1 to leader; its follower history is carried over.
    service
        .update_lag_monitor(&resource, 1, LagMonitorAction::SetLeaderMonitor)
        .await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    for partition in 0..PARTITIONS {
        info!(
            partition,
            leader_lag = service.leader_max_lag(STORE, VERSION, partition),
            follower_lag = service.follower_lag(STORE, VERSION, partition),
            "Partition lag"
        );
    }

    let info = service.get_heartbeat_info_json(&resource, ALL_PARTITIONS, false)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    println!("{}", metrics::encode_metrics().map_err(|e| e.to_string())?);

    tasks.shutdown_all().await;
    Ok(())
}
