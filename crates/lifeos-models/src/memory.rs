//! Memory points stored in the vector database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::video::VideoId;

/// Embedding dimension of the Marengo-retrieval-2.7 model.
pub const VECTOR_SIZE: usize = 1024;

/// One point in the `memories` collection.
///
/// Invariant: `id` equals the relational `video_id`, which is repeated in
/// the payload for filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPoint {
    pub id: VideoId,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub embedding: Vec<f32>,
}

impl MemoryPoint {
    pub fn new(id: VideoId, user_id: Uuid, timestamp: DateTime<Utc>, embedding: Vec<f32>) -> Self {
        Self {
            id,
            user_id,
            timestamp,
            embedding,
        }
    }
}

/// A single hit from a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySearchResult {
    pub id: Uuid,
    pub video_id: VideoId,
    pub timestamp: DateTime<Utc>,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_carries_linking_id_in_both_places() {
        let id = VideoId::new();
        let point = MemoryPoint::new(id, Uuid::new_v4(), Utc::now(), vec![0.0; VECTOR_SIZE]);
        assert_eq!(point.id, id);
        assert_eq!(point.embedding.len(), VECTOR_SIZE);
    }
}
