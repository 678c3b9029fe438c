//! Vector store error types.

use thiserror::Error;

pub type VectorResult<T> = Result<T, VectorError>;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Qdrant error: {0}")]
    Qdrant(#[from] qdrant_client::QdrantError),

    #[error("Embedding has wrong dimension: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Malformed point payload: {0}")]
    MalformedPayload(String),
}

impl VectorError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
