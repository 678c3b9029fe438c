//! Highlights sink: link a user to a video worth remembering.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use lifeos_db::SupabaseClient;
use lifeos_models::{HighlightRecord, SegmentMetadata, VideoId};

pub struct HighlightsSink {
    db: SupabaseClient,
}

impl HighlightsSink {
    pub fn new(db: SupabaseClient) -> Self {
        Self { db }
    }

    /// Insert the highlight row. A missing `user_id` skips the insert
    /// rather than guessing an owner.
    pub async fn add_to_highlights(
        &self,
        video_id: VideoId,
        metadata: &SegmentMetadata,
    ) -> Value {
        let Some(user_id) = metadata.user_id else {
            warn!(video_id = %video_id, "No user_id in metadata, skipping highlight");
            return json!({
                "highlights_automation_triggered": false,
                "reason": "No user_id provided",
                "processing_timestamp": Utc::now(),
            });
        };

        let record = HighlightRecord::new(user_id, video_id);
        match self.db.insert_highlight(&record).await {
            Ok(stored) => {
                info!(video_id = %video_id, user_id = %user_id, "Added video to highlights");
                json!({
                    "highlights_automation_triggered": true,
                    "highlight_id": stored.highlight_id,
                    "message": format!("Video {} added to highlights", video_id),
                    "processing_timestamp": Utc::now(),
                })
            }
            Err(e) => {
                warn!(video_id = %video_id, "Highlight insert failed: {}", e);
                json!({
                    "highlights_automation_triggered": false,
                    "reason": e.to_string(),
                    "processing_timestamp": Utc::now(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use lifeos_db::{RetryConfig, SupabaseClient, SupabaseConfig};

    fn metadata(user_id: Option<uuid::Uuid>) -> SegmentMetadata {
        SegmentMetadata {
            segment_id: 0,
            fps: 10,
            resolution: (1280, 720),
            frame_count: 100,
            duration_seconds: 10.0,
            audio_chunks: 0,
            has_audio: false,
            captured_at: Utc::now(),
            user_id,
        }
    }

    fn sink(base: &str) -> HighlightsSink {
        HighlightsSink::new(
            SupabaseClient::new(SupabaseConfig {
                url: base.to_string(),
                api_key: "test-key".to_string(),
                timeout: std::time::Duration::from_secs(2),
                retry: RetryConfig {
                    max_retries: 1,
                    base_delay_ms: 1,
                    max_delay_ms: 5,
                },
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn missing_user_id_is_a_structured_skip() {
        // The URL is never hit; a request would fail loudly.
        let result = sink("http://127.0.0.1:9")
            .add_to_highlights(VideoId::new(), &metadata(None))
            .await;

        assert_eq!(result["highlights_automation_triggered"], false);
        assert_eq!(result["reason"], "No user_id provided");
    }

    #[tokio::test]
    async fn successful_insert_reports_highlight_id() {
        let server = MockServer::start().await;
        let user_id = uuid::Uuid::new_v4();
        let video_id = VideoId::new();
        let highlight_id = uuid::Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/rest/v1/highlights"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([{
                "highlight_id": highlight_id,
                "user_id": user_id,
                "video_id": video_id,
                "created_at": Utc::now(),
            }])))
            .mount(&server)
            .await;

        let result = sink(&server.uri())
            .add_to_highlights(video_id, &metadata(Some(user_id)))
            .await;

        assert_eq!(result["highlights_automation_triggered"], true);
        assert_eq!(result["highlight_id"], serde_json::json!(highlight_id));
    }
}
