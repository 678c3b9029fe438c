//! Worker pool configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of in-process workers sharing the queue.
    pub num_workers: usize,
    /// Cadence of the queue/worker monitor line.
    pub monitor_interval: Duration,
    /// How long workers get to finish their in-flight job on shutdown.
    pub shutdown_timeout: Duration,
    /// How long detached tasks (embedding, automation) get to drain after
    /// the workers stop.
    pub drain_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: 3,
            monitor_interval: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            num_workers: std::env::var("NUM_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.num_workers),
            monitor_interval: Duration::from_secs(
                std::env::var("WORKER_MONITOR_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            drain_timeout: Duration::from_secs(
                std::env::var("WORKER_DRAIN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}
