//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Segment file not found: {0}")]
    MissingFile(String),

    #[error("Ingest failed: {0}")]
    IngestFailed(String),

    #[error("Summary failed: {0}")]
    SummaryFailed(String),

    #[error("Queue error: {0}")]
    Queue(#[from] lifeos_queue::QueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] lifeos_storage::StorageError),

    #[error("Database error: {0}")]
    Db(#[from] lifeos_db::DbError),

    #[error("Vector store error: {0}")]
    Vector(#[from] lifeos_vector::VectorError),

    #[error("AI client error: {0}")]
    Ml(#[from] lifeos_ml_client::MlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }
}
