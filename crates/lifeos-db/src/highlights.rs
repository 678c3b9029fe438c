//! `highlights` table operations.

use uuid::Uuid;

use lifeos_models::HighlightRecord;

use crate::client::SupabaseClient;
use crate::error::DbResult;

const TABLE: &str = "highlights";

impl SupabaseClient {
    /// Insert one highlight row. Duplicates per `(user_id, video_id)` are
    /// tolerated by design.
    pub async fn insert_highlight(&self, record: &HighlightRecord) -> DbResult<HighlightRecord> {
        self.insert(TABLE, record).await
    }

    /// List a user's highlights, newest first.
    pub async fn list_highlights(&self, user_id: Uuid) -> DbResult<Vec<HighlightRecord>> {
        self.select(
            TABLE,
            &[("user_id", user_id.to_string())],
            Some("created_at.desc"),
            None,
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use lifeos_models::{HighlightRecord, VideoId};

    use crate::client::{SupabaseClient, SupabaseConfig};
    use crate::retry::RetryConfig;

    fn test_client(base: &str) -> SupabaseClient {
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
        .unwrap()
    }

    #[tokio::test]
    async fn insert_highlight_round_trips() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();
        let video_id = VideoId::new();
        let highlight_id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/rest/v1/highlights"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "highlight_id": highlight_id,
                "user_id": user_id,
                "video_id": video_id,
                "created_at": Utc::now(),
            }])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let record = HighlightRecord::new(user_id, video_id);
        let stored = client.insert_highlight(&record).await.unwrap();
        assert_eq!(stored.highlight_id, Some(highlight_id));
        assert_eq!(stored.video_id, video_id);
    }

    #[tokio::test]
    async fn list_highlights_filters_by_user() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/rest/v1/highlights"))
            .and(query_param("user_id", format!("eq.{}", user_id)))
            .and(query_param("order", "created_at.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let rows = client.list_highlights(user_id).await.unwrap();
        assert!(rows.is_empty());
    }
}
