//! Segment jobs flowing through the Redis queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata emitted by the segment builder alongside the container file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMetadata {
    /// Monotonic segment counter within one capture session.
    pub segment_id: u64,
    pub fps: u32,
    /// (width, height)
    pub resolution: (u32, u32),
    /// Frame count after padding.
    pub frame_count: usize,
    /// Actual duration, `frame_count / fps`.
    pub duration_seconds: f64,
    #[serde(default)]
    pub audio_chunks: usize,
    pub has_audio: bool,
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

/// Queue entry lifecycle marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
}

/// One queue entry describing a segment awaiting processing.
///
/// Created by the segment builder, owned by the queue until popped, consumed
/// once per successful worker acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentJob {
    /// Path of the on-disk container; must exist at enqueue time.
    pub video_path: String,
    pub metadata: SegmentMetadata,
    /// Seconds since the Unix epoch at enqueue time.
    pub enqueued_at: f64,
    #[serde(default)]
    pub status: JobStatus,
}

impl SegmentJob {
    pub fn new(video_path: impl Into<String>, metadata: SegmentMetadata) -> Self {
        Self {
            video_path: video_path.into(),
            metadata,
            enqueued_at: Utc::now().timestamp_micros() as f64 / 1_000_000.0,
            status: JobStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> SegmentMetadata {
        SegmentMetadata {
            segment_id: 7,
            fps: 10,
            resolution: (1280, 720),
            frame_count: 100,
            duration_seconds: 10.0,
            audio_chunks: 430,
            has_audio: true,
            captured_at: Utc::now(),
            user_id: Some(Uuid::new_v4()),
        }
    }

    #[test]
    fn job_round_trips_through_json() {
        let job = SegmentJob::new("/tmp/segment_7.mp4", sample_metadata());
        let json = serde_json::to_string(&job).unwrap();
        let back: SegmentJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.video_path, job.video_path);
        assert_eq!(back.metadata.segment_id, 7);
        assert_eq!(back.status, JobStatus::Pending);
    }

    #[test]
    fn status_defaults_to_pending_when_absent() {
        let json = r#"{
            "video_path": "/tmp/segment_0.mp4",
            "metadata": {
                "segment_id": 0,
                "fps": 10,
                "resolution": [1280, 720],
                "frame_count": 100,
                "duration_seconds": 10.0,
                "has_audio": false,
                "captured_at": "2024-01-10T12:00:00Z"
            },
            "enqueued_at": 1704888000.0
        }"#;
        let job: SegmentJob = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.metadata.user_id.is_none());
        assert_eq!(job.metadata.audio_chunks, 0);
    }
}
