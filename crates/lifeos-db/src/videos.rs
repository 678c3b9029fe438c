//! `videos` table operations.

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use lifeos_models::{VectorStatus, VideoId, VideoRecord};

use crate::client::SupabaseClient;
use crate::error::{DbError, DbResult};

const TABLE: &str = "videos";

impl SupabaseClient {
    /// Insert one analysis row. This is the commit point for a segment job.
    ///
    /// A duplicate `video_id` (unique index in place, queue redelivery)
    /// comes back as `AlreadyExists`; callers treat that as success.
    pub async fn insert_video(&self, record: &VideoRecord) -> DbResult<VideoId> {
        let stored: VideoRecord = self.insert(TABLE, record).await?;
        info!(video_id = %stored.video_id, "Stored video analysis");
        Ok(stored.video_id)
    }

    /// Fetch one row by linking id, optionally scoped to a user. The user
    /// filter doubles as the ownership check for the query surface.
    pub async fn get_video(
        &self,
        video_id: VideoId,
        user_id: Option<Uuid>,
    ) -> DbResult<Option<VideoRecord>> {
        let mut filters = vec![("video_id", video_id.to_string())];
        if let Some(user_id) = user_id {
            filters.push(("user_id", user_id.to_string()));
        }

        let rows: Vec<VideoRecord> = self.select(TABLE, &filters, None, Some(1), None).await?;
        Ok(rows.into_iter().next())
    }

    /// List a user's videos, newest first.
    pub async fn list_user_videos(
        &self,
        user_id: Uuid,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<VideoRecord>> {
        self.select(
            TABLE,
            &[("user_id", user_id.to_string())],
            Some("created_at.desc"),
            Some(limit),
            Some(offset),
        )
        .await
    }

    /// Delete one of the user's videos.
    pub async fn delete_video(&self, video_id: VideoId, user_id: Uuid) -> DbResult<()> {
        let deleted = self
            .delete(
                TABLE,
                &[
                    ("video_id", video_id.to_string()),
                    ("user_id", user_id.to_string()),
                ],
            )
            .await?;

        if deleted == 0 {
            return Err(DbError::not_found(video_id.to_string()));
        }
        Ok(())
    }

    /// Update the background-embedding status columns for a row.
    pub async fn update_vector_status(
        &self,
        video_id: VideoId,
        status: VectorStatus,
        vector_id: Option<Uuid>,
    ) -> DbResult<()> {
        let mut body = json!({
            "vector_status": status.as_str(),
            "vector_updated_at": Utc::now(),
        });
        if let Some(vector_id) = vector_id {
            body["vector_id"] = json!(vector_id);
        }

        self.update(TABLE, &[("video_id", video_id.to_string())], &body)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use lifeos_models::{VideoId, VideoRecord};

    use crate::client::{SupabaseClient, SupabaseConfig};
    use crate::error::DbError;
    use crate::retry::RetryConfig;

    fn test_client(base: &str) -> SupabaseClient {
        SupabaseClient::new(SupabaseConfig {
            url: base.to_string(),
            api_key: "test-key".to_string(),
            timeout: std::time::Duration::from_secs(2),
            retry: RetryConfig {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 5,
            },
        })
        .unwrap()
    }

    fn sample_record(video_id: VideoId, user_id: Uuid) -> VideoRecord {
        VideoRecord {
            video_id,
            user_id: Some(user_id),
            timestamp: Utc::now(),
            datetime: Utc::now(),
            detailed_summary: "A person typing at a desk.".to_string(),
            s3_link: None,
            file_size: 1024,
            processed_at: Utc::now(),
            twelvelabs_video_id: Some("tl_abc123".to_string()),
            vector_status: Some(lifeos_models::VectorStatus::Pending),
            vector_updated_at: None,
            vector_id: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn insert_video_returns_linking_id() {
        let server = MockServer::start().await;
        let video_id = VideoId::new();
        let user_id = Uuid::new_v4();
        let record = sample_record(video_id, user_id);

        Mock::given(method("POST"))
            .and(path("/rest/v1/videos"))
            .and(header("Prefer", "return=representation"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!([serde_json::to_value(&record).unwrap()])),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let stored = client.insert_video(&record).await.unwrap();
        assert_eq!(stored, video_id);
    }

    #[tokio::test]
    async fn duplicate_insert_maps_to_already_exists() {
        let server = MockServer::start().await;
        let record = sample_record(VideoId::new(), Uuid::new_v4());

        Mock::given(method("POST"))
            .and(path("/rest/v1/videos"))
            .respond_with(ResponseTemplate::new(409).set_body_string(
                r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#,
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.insert_video(&record).await.unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn list_videos_orders_and_pages() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/videos"))
            .and(query_param("user_id", format!("eq.{}", user_id)))
            .and(query_param("order", "created_at.desc"))
            .and(query_param("limit", "50"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let rows = client.list_user_videos(user_id, 50, 0).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn transient_server_error_is_retried() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/videos"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let rows = client.list_user_videos(user_id, 10, 0).await.unwrap();
        assert!(rows.is_empty());
    }
}
