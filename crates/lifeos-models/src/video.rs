//! Video analysis records and the linking identifier.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Linking identifier for one processed segment.
///
/// Minted by the worker before any external call and used as the primary key
/// in the relational row, the vector point id and the automation log. The
/// TwelveLabs video id is stored alongside it and never used as a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub Uuid);

impl VideoId {
    /// Mint a fresh v4 identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for VideoId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Background embedding status on a video row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorStatus::Pending => "pending",
            VectorStatus::Processing => "processing",
            VectorStatus::Completed => "completed",
            VectorStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for VectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the `videos` table.
///
/// Assembled by the worker after the summary call and inserted exactly once
/// at the commit point. Optional fields stay `None` on degraded paths (blob
/// outage, missing user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: VideoId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    pub datetime: DateTime<Utc>,
    pub detailed_summary: String,
    pub s3_link: Option<String>,
    pub file_size: u64,
    pub processed_at: DateTime<Utc>,
    pub twelvelabs_video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_status: Option<VectorStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_serializes_transparently() {
        let id = VideoId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: VideoId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn vector_status_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&VectorStatus::Completed).unwrap(),
            "\"completed\""
        );
        let parsed: VectorStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, VectorStatus::Failed);
    }
}
