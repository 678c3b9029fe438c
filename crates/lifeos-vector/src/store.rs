//! Memories collection management and point operations.
//!
//! One point per processed segment, keyed by the linking id. Payload carries
//! `user_id` (keyword-indexed), `video_id` and `timestamp`
//! (datetime-indexed) so search can be scoped per user and time range.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use qdrant_client::qdrant::vectors_config::Config;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DatetimeRange,
    DeletePointsBuilder, Distance, FieldType, Filter, GetPointsBuilder, PointId, PointStruct,
    PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
    VectorsConfig,
};
use qdrant_client::Qdrant;
use tracing::{debug, info};
use uuid::Uuid;

use lifeos_models::{MemoryPoint, MemorySearchResult, VideoId, VECTOR_SIZE};

use crate::error::{VectorError, VectorResult};

const COLLECTION_NAME: &str = "memories";
const DEFAULT_SCORE_THRESHOLD: f32 = 0.01;

/// Vector store configuration.
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Qdrant URL, e.g. `http://localhost:6334`
    pub url: String,
    /// Optional API key for hosted clusters
    pub api_key: Option<String>,
    /// Collection name
    pub collection: String,
}

impl VectorStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> VectorResult<Self> {
        Ok(Self {
            url: std::env::var("QDRANT_URL")
                .map_err(|_| VectorError::config_error("QDRANT_URL not set"))?,
            api_key: std::env::var("QDRANT_API_KEY").ok(),
            collection: std::env::var("QDRANT_COLLECTION")
                .unwrap_or_else(|_| COLLECTION_NAME.to_string()),
        })
    }
}

/// Search inputs beyond the query vector.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub user_id: Uuid,
    pub limit: u64,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub score_threshold: Option<f32>,
}

/// Qdrant client wrapper. Process-wide singleton; upserts are idempotent by
/// point id.
pub struct VectorStore {
    client: Qdrant,
    collection: String,
}

impl VectorStore {
    /// Connect to Qdrant.
    pub fn new(config: VectorStoreConfig) -> VectorResult<Self> {
        let mut builder = Qdrant::from_url(&config.url);
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| VectorError::config_error(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection,
        })
    }

    /// Connect from environment variables.
    pub fn from_env() -> VectorResult<Self> {
        Self::new(VectorStoreConfig::from_env()?)
    }

    /// Create the collection and payload indexes if missing.
    pub async fn ensure_collection(&self) -> VectorResult<()> {
        let exists = self.client.collection_exists(&self.collection).await?;
        if exists {
            debug!("Collection '{}' already exists", self.collection);
            return Ok(());
        }

        info!(
            "Creating collection '{}' with dim={}",
            self.collection, VECTOR_SIZE
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
                    VectorsConfig {
                        config: Some(Config::Params(
                            VectorParamsBuilder::new(VECTOR_SIZE as u64, Distance::Cosine).build(),
                        )),
                    },
                ),
            )
            .await?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                self.collection.clone(),
                "user_id",
                FieldType::Keyword,
            ))
            .await?;
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                self.collection.clone(),
                "timestamp",
                FieldType::Datetime,
            ))
            .await?;

        Ok(())
    }

    /// Upsert one memory point. Re-running on a completed segment overwrites
    /// the existing point with the same id.
    pub async fn upsert_memory(&self, memory: &MemoryPoint) -> VectorResult<()> {
        if memory.embedding.len() != VECTOR_SIZE {
            return Err(VectorError::DimensionMismatch {
                expected: VECTOR_SIZE,
                got: memory.embedding.len(),
            });
        }

        let payload = memory_payload(memory);
        let point = PointStruct::new(
            memory.id.to_string(),
            memory.embedding.clone(),
            payload,
        );

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.clone(), vec![point]))
            .await?;

        info!(video_id = %memory.id, "Stored memory point");
        Ok(())
    }

    /// Similarity search scoped to one user, optionally to a time range.
    ///
    /// Results below the score threshold (default 0.01) are never returned.
    pub async fn search_memories(
        &self,
        query_vector: Vec<f32>,
        params: &SearchParams,
    ) -> VectorResult<Vec<MemorySearchResult>> {
        let mut conditions = vec![Condition::matches(
            "user_id",
            params.user_id.to_string(),
        )];

        if params.date_from.is_some() || params.date_to.is_some() {
            conditions.push(Condition::datetime_range(
                "timestamp",
                DatetimeRange {
                    gt: None,
                    gte: params.date_from.and_then(|d| d.to_rfc3339().parse().ok()),
                    lt: None,
                    lte: params.date_to.and_then(|d| d.to_rfc3339().parse().ok()),
                },
            ));
        }

        let search = SearchPointsBuilder::new(
            self.collection.clone(),
            query_vector,
            params.limit,
        )
        .filter(Filter::must(conditions))
        .score_threshold(params.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD))
        .with_payload(true);

        let response = self.client.search_points(search).await?;

        let mut results = Vec::with_capacity(response.result.len());
        for point in response.result {
            let id = match point.id.as_ref().and_then(point_id_uuid) {
                Some(id) => id,
                None => continue,
            };
            match parse_payload(id, point.score, &point.payload) {
                Ok(result) => results.push(result),
                Err(e) => {
                    debug!("Skipping malformed search hit: {}", e);
                }
            }
        }

        Ok(results)
    }

    /// Fetch one point by id, payload and vector included.
    pub async fn retrieve_memory(&self, id: VideoId) -> VectorResult<Option<MemoryPoint>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(
                    self.collection.clone(),
                    vec![PointId::from(id.to_string())],
                )
                .with_payload(true)
                .with_vectors(true),
            )
            .await?;

        let Some(point) = response.result.into_iter().next() else {
            return Ok(None);
        };

        let user_id = point
            .payload
            .get("user_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| VectorError::MalformedPayload("user_id missing".to_string()))?;
        let timestamp = point
            .payload
            .get("timestamp")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| VectorError::MalformedPayload("timestamp missing".to_string()))?;
        let embedding = point
            .vectors
            .and_then(|v| match v.vectors_options? {
                qdrant_client::qdrant::vectors_output::VectorsOptions::Vector(v) => Some(v.data),
                _ => None,
            })
            .unwrap_or_default();

        Ok(Some(MemoryPoint::new(id, user_id, timestamp, embedding)))
    }

    /// Delete points by id. Returns `(deleted, failed, errors)` so the API
    /// layer can report partial failures.
    pub async fn delete_memories(&self, ids: &[Uuid]) -> (u32, u32, Vec<String>) {
        if ids.is_empty() {
            return (0, 0, Vec::new());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_string())).collect();

        let result = self
            .client
            .delete_points(
                DeletePointsBuilder::new(self.collection.clone())
                    .points(PointsIdsList { ids: point_ids }),
            )
            .await;

        match result {
            Ok(_) => (ids.len() as u32, 0, Vec::new()),
            Err(e) => (
                0,
                ids.len() as u32,
                vec![format!("Failed to delete memories: {}", e)],
            ),
        }
    }

    /// Liveness probe for the health endpoint.
    pub async fn health_check(&self) -> bool {
        self.client.collection_exists(&self.collection).await.is_ok()
    }
}

fn memory_payload(memory: &MemoryPoint) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert(
        "user_id".to_string(),
        Value::from(memory.user_id.to_string()),
    );
    payload.insert("video_id".to_string(), Value::from(memory.id.to_string()));
    payload.insert(
        "timestamp".to_string(),
        Value::from(memory.timestamp.to_rfc3339()),
    );
    payload
}

fn parse_payload(
    id: Uuid,
    score: f32,
    payload: &HashMap<String, Value>,
) -> VectorResult<MemorySearchResult> {
    let video_id = payload
        .get("video_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| VectorError::MalformedPayload("video_id missing".to_string()))?;
    let timestamp = payload
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| VectorError::MalformedPayload("timestamp missing".to_string()))?;

    Ok(MemorySearchResult {
        id,
        video_id: VideoId::from(video_id),
        timestamp,
        score,
    })
}

fn point_id_uuid(id: &PointId) -> Option<Uuid> {
    use qdrant_client::qdrant::point_id::PointIdOptions;
    match id.point_id_options.as_ref()? {
        PointIdOptions::Uuid(u) => Uuid::parse_str(u).ok(),
        PointIdOptions::Num(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_links_point_to_relational_row() {
        let id = VideoId::new();
        let user_id = Uuid::new_v4();
        let memory = MemoryPoint::new(id, user_id, Utc::now(), vec![0.0; VECTOR_SIZE]);
        let payload = memory_payload(&memory);

        assert_eq!(
            payload.get("video_id").and_then(|v| v.as_str()).cloned(),
            Some(id.to_string())
        );
        assert_eq!(
            payload.get("user_id").and_then(|v| v.as_str()).cloned(),
            Some(user_id.to_string())
        );
        assert!(payload.contains_key("timestamp"));
    }

    #[test]
    fn parse_payload_round_trips() {
        let id = VideoId::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let memory = MemoryPoint::new(id, user_id, now, vec![0.0; VECTOR_SIZE]);
        let payload = memory_payload(&memory);

        let result = parse_payload(id.as_uuid(), 0.42, &payload).unwrap();
        assert_eq!(result.video_id, id);
        assert_eq!(result.timestamp.timestamp(), now.timestamp());
        assert!((result.score - 0.42).abs() < f32::EPSILON);
    }

    #[test]
    fn parse_payload_rejects_missing_video_id() {
        let payload = HashMap::new();
        let err = parse_payload(Uuid::new_v4(), 0.5, &payload).unwrap_err();
        assert!(matches!(err, VectorError::MalformedPayload(_)));
    }

    #[test]
    fn dimension_guard_matches_model_constant() {
        assert_eq!(VECTOR_SIZE, 1024);
    }
}
