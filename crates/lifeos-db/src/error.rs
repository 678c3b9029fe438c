//! Relational store error types.

use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Row already exists: {0}")]
    AlreadyExists(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Map an HTTP status from PostgREST to an error variant.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            404 => Self::NotFound(body),
            409 => Self::AlreadyExists(body),
            429 => Self::RateLimited(1000),
            s if s >= 500 => Self::ServerError(s, body),
            _ => Self::RequestFailed(format!("status {}: {}", status, body)),
        }
    }

    /// Check if the error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Network(_) | DbError::RateLimited(_) | DbError::ServerError(_, _)
        )
    }

    /// Server-suggested retry delay, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            DbError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            DbError::from_http_status(404, "gone"),
            DbError::NotFound(_)
        ));
        assert!(matches!(
            DbError::from_http_status(409, "duplicate key"),
            DbError::AlreadyExists(_)
        ));
        assert!(matches!(
            DbError::from_http_status(503, "down"),
            DbError::ServerError(503, _)
        ));
    }

    #[test]
    fn retryability() {
        assert!(DbError::from_http_status(500, "oops").is_retryable());
        assert!(DbError::from_http_status(429, "slow down").is_retryable());
        assert!(!DbError::from_http_status(400, "bad").is_retryable());
        assert!(!DbError::from_http_status(409, "dup").is_retryable());
    }
}
