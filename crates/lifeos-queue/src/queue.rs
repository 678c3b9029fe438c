//! Segment queue over a Redis list.
//!
//! Producers left-push, workers blocking-right-pop with a short timeout so
//! shutdown signals are observed quickly. Delivery is at-least-once; the
//! worker's relational insert is the idempotency anchor.

use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, info};

use lifeos_models::SegmentJob;

use crate::error::{QueueError, QueueResult};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// List key holding pending jobs
    pub queue_name: String,
    /// Blocking pop timeout
    pub pop_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            queue_name: "lifeos:video_segments".to_string(),
            pop_timeout: Duration::from_millis(500),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            queue_name: std::env::var("QUEUE_NAME")
                .unwrap_or_else(|_| "lifeos:video_segments".to_string()),
            pop_timeout: Duration::from_millis(
                std::env::var("QUEUE_POP_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(500),
            ),
        }
    }
}

/// Segment queue client.
pub struct SegmentQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl SegmentQueue {
    /// Create a new queue client.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    /// Verify the broker is reachable. Workers call this at startup and
    /// treat failure as fatal for the process.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        info!("Connected to Redis at {}", self.config.redis_url);
        Ok(())
    }

    /// Push one job onto the queue.
    pub async fn push(&self, job: &SegmentJob) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;
        conn.lpush::<_, _, ()>(&self.config.queue_name, payload)
            .await?;
        debug!(
            segment_id = job.metadata.segment_id,
            path = %job.video_path,
            "Enqueued segment"
        );
        Ok(())
    }

    /// Push a batch of jobs in a single broker round-trip.
    pub async fn push_batch(&self, jobs: &[SegmentJob]) -> QueueResult<usize> {
        if jobs.is_empty() {
            return Ok(0);
        }

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut pipe = redis::pipe();
        for job in jobs {
            let payload = serde_json::to_string(job)?;
            pipe.lpush(&self.config.queue_name, payload).ignore();
        }
        pipe.query_async::<()>(&mut conn).await?;

        info!(count = jobs.len(), "Enqueued segment batch");
        Ok(jobs.len())
    }

    /// Blocking pop of the oldest job. Returns `None` on timeout; callers
    /// treat that as "no work" and re-check their shutdown flag.
    pub async fn pop(&self) -> QueueResult<Option<SegmentJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let timeout = self.config.pop_timeout.as_secs_f64();

        let result: Option<(String, String)> =
            conn.brpop(&self.config.queue_name, timeout).await?;

        match result {
            Some((_, payload)) => {
                let job: SegmentJob = serde_json::from_str(&payload)?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Current queue depth.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.llen(&self.config.queue_name).await?;
        Ok(len)
    }

    /// Drop every pending job. Used by operational tooling and tests.
    pub async fn clear(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(&self.config.queue_name).await?;
        info!("Queue cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_protocol() {
        let config = QueueConfig::default();
        assert_eq!(config.queue_name, "lifeos:video_segments");
        assert_eq!(config.pop_timeout, Duration::from_millis(500));
    }

    #[test]
    fn payload_round_trip_preserves_metadata() {
        use chrono::Utc;
        use lifeos_models::SegmentMetadata;

        let job = SegmentJob::new(
            "/tmp/segment_3.mp4",
            SegmentMetadata {
                segment_id: 3,
                fps: 10,
                resolution: (1280, 720),
                frame_count: 100,
                duration_seconds: 10.0,
                audio_chunks: 0,
                has_audio: false,
                captured_at: Utc::now(),
                user_id: None,
            },
        );
        let payload = serde_json::to_string(&job).unwrap();
        let back: SegmentJob = serde_json::from_str(&payload).unwrap();
        assert_eq!(back.metadata.segment_id, 3);
        assert_eq!(back.metadata.resolution, (1280, 720));
    }
}
