//! Highlight rows linking users to videos worth remembering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::video::VideoId;

/// One row of the `highlights` table.
///
/// Duplicates per `(user_id, video_id)` are tolerated; the table has no
/// uniqueness constraint beyond the primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight_id: Option<Uuid>,
    pub user_id: Uuid,
    pub video_id: VideoId,
    pub created_at: DateTime<Utc>,
}

impl HighlightRecord {
    pub fn new(user_id: Uuid, video_id: VideoId) -> Self {
        Self {
            highlight_id: None,
            user_id,
            video_id,
            created_at: Utc::now(),
        }
    }
}
