//! Worker pool: supervision, monitoring, graceful shutdown.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::services::Services;
use crate::worker::Worker;

/// Supervises N workers sharing one queue and one detached-task group.
pub struct WorkerPool {
    config: WorkerConfig,
    services: Arc<Services>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig, services: Services) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            services: Arc::new(services),
            shutdown,
        }
    }

    /// Start the workers and block until shutdown completes.
    pub async fn run(&self) -> WorkerResult<()> {
        info!("Starting {} video processing workers", self.config.num_workers);

        // Broker unreachable at startup is fatal for the process.
        self.services.queue.ping().await?;

        // Best-effort infrastructure bootstrap; workers surface the
        // concrete failures per job.
        if let Err(e) = self.services.storage.ensure_bucket().await {
            warn!("Bucket bootstrap failed: {}", e);
        }
        if let Err(e) = self.services.vector.ensure_collection().await {
            warn!("Vector collection bootstrap failed: {}", e);
        }
        match self.services.index_id().await {
            Ok(index_id) => info!("Using TwelveLabs index {}", index_id),
            Err(e) => warn!("Index bootstrap failed, workers will retry: {}", e),
        }

        // Detached embedding/automation tasks outlive the jobs that spawned
        // them; the tracker lets shutdown drain them with a deadline.
        let tracker = TaskTracker::new();

        let mut worker_tasks = Vec::with_capacity(self.config.num_workers);
        let mut worker_stats = Vec::with_capacity(self.config.num_workers);

        for worker_id in 0..self.config.num_workers {
            let worker = Worker::new(
                worker_id,
                Arc::clone(&self.services),
                tracker.clone(),
                self.shutdown.subscribe(),
            );
            worker_stats.push(worker.stats_handles());
            worker_tasks.push(tokio::spawn(worker.run()));
        }

        info!("All {} workers started", self.config.num_workers);

        self.monitor(&worker_stats).await;

        // Shutdown path: workers observe the flag within one pop timeout.
        info!("Waiting for workers to finish in-flight jobs...");
        let join_all = async {
            for task in worker_tasks {
                if let Err(e) = task.await {
                    error!("Worker task panicked: {}", e);
                }
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, join_all)
            .await
            .is_err()
        {
            warn!("Some workers took too long to stop, abandoning them");
        }

        tracker.close();
        info!("Draining background tasks ({} pending)...", tracker.len());
        if tokio::time::timeout(self.config.drain_timeout, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                "Abandoning {} background tasks after drain timeout",
                tracker.len()
            );
        }

        info!("Worker pool stopped");
        Ok(())
    }

    /// Emit the monitoring line until a shutdown signal arrives.
    async fn monitor(&self, stats: &[(Arc<AtomicBool>, Arc<AtomicU64>)]) {
        let mut interval = tokio::time::interval(self.config.monitor_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let signal = shutdown_signal();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let queue_size = self.services.queue.len().await.unwrap_or(0);
                    let active = stats
                        .iter()
                        .filter(|(running, _)| running.load(Ordering::Relaxed))
                        .count();
                    let processed: u64 = stats
                        .iter()
                        .map(|(_, count)| count.load(Ordering::Relaxed))
                        .sum();
                    info!(
                        "Queue: {} items | Active workers: {}/{} | Processed: {}",
                        queue_size,
                        active,
                        self.config.num_workers,
                        processed
                    );
                }
                _ = &mut signal => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown.send(true);
                    break;
                }
            }
        }
    }

    /// Trigger shutdown programmatically (used by tests).
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
