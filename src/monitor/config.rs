//! Configuration for the heartbeat monitor.
//!
//! # Environment Variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `LAGWATCH_REGIONS` | `local` | Comma-separated region names, `_sep` variants included |
//! | `LAGWATCH_LOCAL_REGION` | first region | Region this process runs in |
//! | `LAGWATCH_REPORT_INTERVAL_MS` | 60000 | Stat reporter tick |
//! | `LAGWATCH_MAX_WAIT_FOR_VERSION_MS` | 5000 | Topology lookup budget |
//! | `LAGWATCH_LAGGING_THRESHOLD_MS` | 600000 | Lag reported by lagging-only queries |

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DEFAULT_LAGGING_THRESHOLD_MS, DEFAULT_MAX_WAIT_FOR_VERSION_MS, DEFAULT_REPORT_INTERVAL_MS,
};
use crate::error::{MonitorError, MonitorResult};
use crate::types::is_separate_topic_region;

/// Heartbeat monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Every region a partition may receive heartbeats from, including
    /// separate real-time topic variants (`dc-1_sep`).
    pub region_names: Vec<Arc<str>>,

    /// Region this process runs in. Follower lag is measured against it.
    pub local_region: Arc<str>,

    /// How often the stat reporter publishes gauges.
    pub report_interval: Duration,

    /// Upper bound on a single topology resolution, retries included.
    pub max_wait_for_version_info: Duration,

    /// Lag above which a replica shows up in lagging-only diagnostic queries.
    pub lagging_threshold: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            region_names: vec![Arc::from("local")],
            local_region: Arc::from("local"),
            report_interval: Duration::from_millis(DEFAULT_REPORT_INTERVAL_MS),
            max_wait_for_version_info: Duration::from_millis(DEFAULT_MAX_WAIT_FOR_VERSION_MS),
            lagging_threshold: Duration::from_millis(DEFAULT_LAGGING_THRESHOLD_MS),
        }
    }
}

impl MonitorConfig {
    /// Config for the given regions; the first non-`_sep` region is local.
    pub fn with_regions<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let region_names: Vec<Arc<str>> = regions
            .into_iter()
            .map(|r| Arc::from(r.as_ref()))
            .collect();
        let local_region = region_names
            .iter()
            .find(|r| !is_separate_topic_region(r))
            .cloned()
            .unwrap_or_else(|| Arc::from(""));
        Self {
            region_names,
            local_region,
            ..Default::default()
        }
    }

    pub fn local_region(mut self, region: impl AsRef<str>) -> Self {
        self.local_region = Arc::from(region.as_ref());
        self
    }

    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn max_wait_for_version_info(mut self, wait: Duration) -> Self {
        self.max_wait_for_version_info = wait;
        self
    }

    pub fn lagging_threshold(mut self, threshold: Duration) -> Self {
        self.lagging_threshold = threshold;
        self
    }

    /// Lagging threshold in milliseconds, saturated to `i64`.
    pub fn lagging_threshold_ms(&self) -> i64 {
        i64::try_from(self.lagging_threshold.as_millis()).unwrap_or(i64::MAX)
    }

    /// Validate the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.region_names.is_empty() {
            errors.push("at least one region name is required".to_string());
        }
        if self.region_names.iter().any(|r| r.trim().is_empty()) {
            errors.push("region names must not be empty".to_string());
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for region in &self.region_names {
            if !seen.insert(region) {
                errors.push(format!("duplicate region name '{}'", region));
            }
        }
        if is_separate_topic_region(&self.local_region) {
            errors.push(format!(
                "local region '{}' must not be a separate real-time topic variant",
                self.local_region
            ));
        }
        if !self.region_names.contains(&self.local_region) {
            errors.push(format!(
                "local region '{}' is not one of the configured regions",
                self.local_region
            ));
        }
        if self.report_interval.is_zero() {
            errors.push("report_interval must be greater than zero".to_string());
        }
        if self.max_wait_for_version_info.is_zero() {
            errors.push("max_wait_for_version_info must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, converting problems into a [`MonitorError::Config`].
    pub fn validated(self) -> MonitorResult<Self> {
        self.validate().map_err(MonitorError::Config)?;
        Ok(self)
    }

    /// Build configuration from `LAGWATCH_*` environment variables.
    pub fn from_env() -> MonitorResult<Self> {
        let defaults = Self::default();

        let regions = std::env::var("LAGWATCH_REGIONS").unwrap_or_else(|_| "local".to_string());
        let mut config = Self::with_regions(
            regions
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty()),
        );

        if let Ok(local) = std::env::var("LAGWATCH_LOCAL_REGION") {
            config = config.local_region(local.trim());
        }

        config.report_interval = duration_from_env(
            "LAGWATCH_REPORT_INTERVAL_MS",
            defaults.report_interval,
        )?;
        config.max_wait_for_version_info = duration_from_env(
            "LAGWATCH_MAX_WAIT_FOR_VERSION_MS",
            defaults.max_wait_for_version_info,
        )?;
        config.lagging_threshold = duration_from_env(
            "LAGWATCH_LAGGING_THRESHOLD_MS",
            defaults.lagging_threshold,
        )?;

        config.validated()
    }
}

fn duration_from_env(var: &str, default: Duration) -> MonitorResult<Duration> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| MonitorError::Config(vec![format!("Invalid {var}: {e}")])),
        Err(_) => Ok(default),
    }
}
