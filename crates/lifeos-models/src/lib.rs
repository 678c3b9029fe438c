//! Shared data models for the LifeOS backend.
//!
//! This crate provides Serde-serializable types for:
//! - Segment jobs flowing through the Redis queue
//! - Video analysis records stored in Supabase
//! - Memory points and search results backed by Qdrant
//! - Highlights and automation results
//! - Calendar events extracted from summaries

pub mod automation;
pub mod calendar;
pub mod highlight;
pub mod memory;
pub mod segment;
pub mod user;
pub mod video;

pub use automation::{
    AutomationKind, AutomationOutcome, AutomationReport, ConfidenceScores, SummaryAnalysis,
};
pub use calendar::{CalendarEventRecord, ExtractedEvent};
pub use highlight::HighlightRecord;
pub use memory::{MemoryPoint, MemorySearchResult, VECTOR_SIZE};
pub use segment::{JobStatus, SegmentJob, SegmentMetadata};
pub use user::User;
pub use video::{VectorStatus, VideoId, VideoRecord};
