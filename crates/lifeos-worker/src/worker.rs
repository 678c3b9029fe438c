//! Per-segment worker state machine.
//!
//! Phases per job: mint the linking id, launch ingest/blob/embed in
//! parallel, await ingest readiness, summarize, insert the relational row
//! (the commit point), then detach embedding finalization and automation
//! dispatch. A routine job failure never kills the worker.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lifeos_db::DbError;
use lifeos_models::{MemoryPoint, SegmentJob, SegmentMetadata, VectorStatus, VideoId, VideoRecord};

use crate::automation::AutomationController;
use crate::error::{WorkerError, WorkerResult};
use crate::services::Services;

/// Summary prompt sent for every segment.
const SUMMARY_PROMPT: &str = "Provide a detailed summary of what's happening in this video \
segment, including any people, objects, actions, and conversations.";

/// Attempts for the embedding finalization, backing off `2^k` seconds.
const EMBED_ATTEMPTS: u32 = 3;

/// One worker instance. Owns its AI client handles; shares the queue, the
/// relational and the vector clients through [`Services`].
pub struct Worker {
    worker_id: usize,
    services: Arc<Services>,
    automation: Arc<AutomationController>,
    tracker: TaskTracker,
    shutdown: watch::Receiver<bool>,
    running: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
}

impl Worker {
    pub fn new(
        worker_id: usize,
        services: Arc<Services>,
        tracker: TaskTracker,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let automation = Arc::new(AutomationController::new(&services));
        Self {
            worker_id,
            services,
            automation,
            tracker,
            shutdown,
            running: Arc::new(AtomicBool::new(true)),
            processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared flags for the pool monitor.
    pub fn stats_handles(&self) -> (Arc<AtomicBool>, Arc<AtomicU64>) {
        (Arc::clone(&self.running), Arc::clone(&self.processed))
    }

    /// Main loop: pop with a short timeout, process, repeat. The short pop
    /// timeout is what makes shutdown cooperative.
    pub async fn run(self) {
        info!("Worker {} starting", self.worker_id);

        while self.running.load(Ordering::Relaxed) && !*self.shutdown.borrow() {
            match self.services.queue.pop().await {
                Ok(Some(job)) => {
                    let path = job.video_path.clone();
                    match self.process_segment(job).await {
                        Ok(video_id) => {
                            let count = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
                            info!(
                                "Worker {} completed job {} ({} -> {})",
                                self.worker_id, count, path, video_id
                            );
                        }
                        Err(e) => {
                            error!("Worker {} failed to process {}: {}", self.worker_id, path, e);
                        }
                    }
                }
                Ok(None) => {
                    // No work within the pop timeout.
                }
                Err(e) => {
                    error!("Worker {} queue error: {}", self.worker_id, e);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }

        self.running.store(false, Ordering::Relaxed);
        info!("Worker {} stopped", self.worker_id);
    }

    /// Process one segment job through P1-P4.
    async fn process_segment(&self, job: SegmentJob) -> WorkerResult<VideoId> {
        let path = PathBuf::from(&job.video_path);
        if !path.exists() {
            return Err(WorkerError::MissingFile(job.video_path));
        }

        // P1: mint the linking id before any I/O, then launch the three
        // independent uploads concurrently. Each owns its retries.
        let video_id = VideoId::new();
        debug!("Worker {} minted linking id {}", self.worker_id, video_id);

        let (ingest, s3_link, embed_task) = tokio::join!(
            self.ingest_and_wait(&path),
            self.upload_blob(&path),
            self.create_embed_task(&path),
        );

        // P2 outcome: a terminal ingest failure is fatal for the job.
        let twelvelabs_video_id = match ingest {
            Ok(id) => id,
            Err(e) => {
                release_file(&path).await;
                return Err(e);
            }
        };

        // P3: summarize, then assemble the analysis record.
        let summary = match self
            .services
            .twelvelabs
            .generate_summary(&twelvelabs_video_id, SUMMARY_PROMPT)
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                release_file(&path).await;
                return Err(WorkerError::SummaryFailed(e.to_string()));
            }
        };

        let file_size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        let captured_at = job.metadata.captured_at;
        let record = VideoRecord {
            video_id,
            user_id: job.metadata.user_id,
            timestamp: captured_at,
            datetime: captured_at,
            detailed_summary: summary.clone(),
            s3_link,
            file_size,
            processed_at: Utc::now(),
            twelvelabs_video_id: Some(twelvelabs_video_id),
            vector_status: Some(VectorStatus::Pending),
            vector_updated_at: None,
            vector_id: None,
            created_at: None,
        };

        // P4: the relational insert is the commit point. A duplicate key
        // means the broker redelivered an already-committed job.
        match self.services.db.insert_video(&record).await {
            Ok(_) => {}
            Err(DbError::AlreadyExists(_)) => {
                info!(video_id = %video_id, "Row already present, treating replay as success");
            }
            Err(e) => {
                release_file(&path).await;
                return Err(e.into());
            }
        }

        // Both uploads consumed the file during P1; it can go now.
        release_file(&path).await;

        // Detached work may complete after the next job is picked up.
        self.spawn_automation(video_id, summary, job.metadata.clone());
        self.spawn_vector_finalize(video_id, embed_task, &job.metadata);

        Ok(video_id)
    }

    /// Ingest POST plus adaptive wait-for-ready.
    async fn ingest_and_wait(&self, path: &Path) -> WorkerResult<String> {
        let index_id = self
            .services
            .index_id()
            .await
            .map_err(|e| WorkerError::IngestFailed(e.to_string()))?
            .to_string();

        let task_id = self
            .services
            .twelvelabs
            .create_index_task(&index_id, path)
            .await
            .map_err(|e| WorkerError::IngestFailed(e.to_string()))?;

        self.services
            .twelvelabs
            .wait_for_ready(&task_id)
            .await
            .map_err(|e| WorkerError::IngestFailed(e.to_string()))
    }

    /// Blob PUT. Failure is non-fatal; the row is written without a link.
    async fn upload_blob(&self, path: &Path) -> Option<String> {
        match self.services.storage.upload_segment(path).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("S3 upload failed, continuing without link: {}", e);
                None
            }
        }
    }

    /// Embedding task creation. Failure is degraded-success; the vector
    /// status ends up `failed` without blocking the commit point.
    async fn create_embed_task(&self, path: &Path) -> Option<String> {
        match self.services.twelvelabs.create_embed_task(path).await {
            Ok(task_id) => Some(task_id),
            Err(e) => {
                warn!("Embedding task creation failed: {}", e);
                None
            }
        }
    }

    /// Fire-and-log automation dispatch.
    fn spawn_automation(&self, video_id: VideoId, summary: String, metadata: SegmentMetadata) {
        if summary.trim().is_empty() {
            return;
        }

        let automation = Arc::clone(&self.automation);
        let worker_id = self.worker_id;
        self.tracker.spawn(async move {
            let report = automation.process_summary(video_id, &summary, &metadata).await;
            match serde_json::to_string(&report) {
                Ok(json) => info!("Worker {} automation report: {}", worker_id, json),
                Err(e) => warn!("Worker {} automation report unserializable: {}", worker_id, e),
            }
        });
    }

    /// Fire-and-log embedding finalization with bounded retries.
    fn spawn_vector_finalize(
        &self,
        video_id: VideoId,
        embed_task: Option<String>,
        metadata: &SegmentMetadata,
    ) {
        let services = Arc::clone(&self.services);
        let user_id = metadata.user_id;
        let timestamp = metadata.captured_at;
        let worker_id = self.worker_id;

        self.tracker.spawn(async move {
            let Some(task_id) = embed_task else {
                services
                    .db
                    .update_vector_status(video_id, VectorStatus::Failed, None)
                    .await
                    .ok();
                return;
            };
            let Some(user_id) = user_id else {
                warn!(video_id = %video_id, "No user_id on segment, skipping vector point");
                services
                    .db
                    .update_vector_status(video_id, VectorStatus::Failed, None)
                    .await
                    .ok();
                return;
            };

            services
                .db
                .update_vector_status(video_id, VectorStatus::Processing, None)
                .await
                .ok();

            for attempt in 1..=EMBED_ATTEMPTS {
                match finalize_embedding(&services, &task_id, video_id, user_id, timestamp).await {
                    Ok(()) => {
                        services
                            .db
                            .update_vector_status(
                                video_id,
                                VectorStatus::Completed,
                                Some(video_id.as_uuid()),
                            )
                            .await
                            .ok();
                        info!("Worker {} stored vector point {}", worker_id, video_id);
                        return;
                    }
                    Err(e) if attempt < EMBED_ATTEMPTS => {
                        warn!(
                            "Embedding attempt {}/{} for {} failed: {}",
                            attempt, EMBED_ATTEMPTS, video_id, e
                        );
                        tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
                    }
                    Err(e) => {
                        error!("Embedding for {} failed permanently: {}", video_id, e);
                        services
                            .db
                            .update_vector_status(video_id, VectorStatus::Failed, None)
                            .await
                            .ok();
                    }
                }
            }
        });
    }
}

/// Wait for the embedding task, pull the vector and upsert the point.
async fn finalize_embedding(
    services: &Services,
    task_id: &str,
    video_id: VideoId,
    user_id: Uuid,
    timestamp: DateTime<Utc>,
) -> WorkerResult<()> {
    services.twelvelabs.wait_for_embedding(task_id).await?;
    let embedding = services.twelvelabs.retrieve_embedding(task_id).await?;

    let point = MemoryPoint::new(video_id, user_id, timestamp, embedding);
    services.vector.upsert_memory(&point).await?;
    Ok(())
}

async fn release_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!("Could not release {}: {}", path.display(), e);
    }
}
