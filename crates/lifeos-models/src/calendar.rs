//! Calendar events extracted from video summaries.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// One event as returned by the structured-extraction prompt. All fields are
/// defaulted; the extractor normalizes dates and times afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEvent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    /// Minutes; 0 means "use the default".
    #[serde(default)]
    pub duration: u32,
    #[serde(default, rename = "type")]
    pub event_type: String,
}

/// A normalized event, either posted to the external calendar or simulated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEventRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    /// Local time in America/New_York, offset preserved.
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracted_event_tolerates_sparse_json() {
        let event: ExtractedEvent =
            serde_json::from_str(r#"{"title": "Team sync", "date": "monday"}"#).unwrap();
        assert_eq!(event.title, "Team sync");
        assert_eq!(event.date, "monday");
        assert!(event.time.is_empty());
        assert_eq!(event.duration, 0);
    }
}
