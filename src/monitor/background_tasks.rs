//! Named background tasks with a shared shutdown signal.
//!
//! The monitor runs its stat reporter as a periodic task here. Every task is
//! raced against a broadcast shutdown signal, so stopping the registry stops
//! every loop at its next await point.
//!
//! ```rust,no_run
//! use lagwatch::monitor::BackgroundTaskRegistry;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut registry = BackgroundTaskRegistry::new();
//!     registry.spawn_periodic("stat_reporter", Duration::from_secs(60), |_tick| async {
//!         // publish gauges
//!     });
//!
//!     registry.shutdown_all().await;
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const STATE_RUNNING: u8 = 0;
const STATE_COMPLETED: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Status of a background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    /// The task future returned on its own.
    Completed,
    /// The task panicked or was aborted.
    Failed,
    /// The task exited on the shutdown signal.
    Stopped,
}

impl TaskStatus {
    /// Running or completed.
    pub fn is_healthy(&self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::Completed)
    }
}

struct TaskInfo {
    handle: JoinHandle<()>,
    state: Arc<AtomicU8>,
    spawned_at: Instant,
}

impl TaskInfo {
    fn status(&self) -> TaskStatus {
        match self.state.load(Ordering::Acquire) {
            STATE_COMPLETED => TaskStatus::Completed,
            STATE_STOPPED => TaskStatus::Stopped,
            _ if self.handle.is_finished() => TaskStatus::Failed,
            _ => TaskStatus::Running,
        }
    }
}

/// Registry of the monitor's background tasks.
pub struct BackgroundTaskRegistry {
    tasks: HashMap<&'static str, TaskInfo>,
    shutdown_tx: broadcast::Sender<()>,
    shutting_down: bool,
}

impl BackgroundTaskRegistry {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            tasks: HashMap::new(),
            shutdown_tx,
            shutting_down: false,
        }
    }

    /// Spawn a named task. A task already registered under `name` is aborted
    /// and replaced. Spawning during shutdown is ignored.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shutting_down {
            warn!(task = name, "Ignoring spawn during shutdown");
            return;
        }

        if let Some(previous) = self.tasks.remove(name) {
            previous.handle.abort();
            debug!(task = name, "Aborted previous task instance");
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let state = Arc::new(AtomicU8::new(STATE_RUNNING));
        let task_state = Arc::clone(&state);

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task => {
                    task_state.store(STATE_COMPLETED, Ordering::Release);
                    debug!(task = name, "Task completed");
                }
                _ = shutdown_rx.recv() => {
                    task_state.store(STATE_STOPPED, Ordering::Release);
                    debug!(task = name, "Task received shutdown signal");
                }
            }
        });

        info!(task = name, "Spawned background task");
        self.tasks.insert(
            name,
            TaskInfo {
                handle,
                state,
                spawned_at: Instant::now(),
            },
        );
    }

    /// Spawn a task calling `task` once per `interval`, first tick immediately.
    ///
    /// Missed ticks are delayed rather than bursted, so a slow tick never
    /// causes back-to-back reports.
    pub fn spawn_periodic<F, Fut>(&mut self, name: &'static str, interval: Duration, mut task: F)
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        self.spawn(name, async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut tick = 0u64;
            loop {
                timer.tick().await;
                task(tick).await;
                tick = tick.wrapping_add(1);
            }
        });
    }

    /// (name, status) of every registered task.
    pub fn health_check(&self) -> Vec<(&'static str, TaskStatus)> {
        self.tasks
            .iter()
            .map(|(name, info)| (*name, info.status()))
            .collect()
    }

    pub fn all_healthy(&self) -> bool {
        self.tasks.values().all(|info| info.status().is_healthy())
    }

    pub fn failed_tasks(&self) -> Vec<&'static str> {
        self.tasks
            .iter()
            .filter(|(_, info)| info.status() == TaskStatus::Failed)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_uptime(&self, name: &str) -> Option<Duration> {
        self.tasks.get(name).map(|info| info.spawned_at.elapsed())
    }

    /// Signal shutdown and wait up to five seconds for tasks to exit.
    pub async fn shutdown_all(&mut self) {
        self.shutdown_all_with_timeout(Duration::from_secs(5)).await;
    }

    /// Signal shutdown and wait up to `timeout`; stragglers are aborted.
    pub async fn shutdown_all_with_timeout(&mut self, timeout: Duration) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;

        info!(task_count = self.tasks.len(), "Initiating background task shutdown");
        let _ = self.shutdown_tx.send(());

        let deadline = tokio::time::Instant::now() + timeout;
        for (name, info) in self.tasks.drain() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let abort = info.handle.abort_handle();
            match tokio::time::timeout(remaining, info.handle).await {
                Ok(Ok(())) => debug!(task = name, "Task shutdown complete"),
                Ok(Err(e)) => warn!(task = name, error = %e, "Task failed during shutdown"),
                Err(_) => {
                    warn!(task = name, "Task did not respond to shutdown, aborting");
                    abort.abort();
                }
            }
        }

        info!("All background tasks shutdown complete");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }
}

impl Default for BackgroundTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BackgroundTaskRegistry {
    fn drop(&mut self) {
        if !self.shutting_down {
            let _ = self.shutdown_tx.send(());
            for (name, info) in self.tasks.drain() {
                debug!(task = name, "Aborting task on registry drop");
                info.handle.abort();
            }
        }
    }
}
