//! S3 storage for raw video segments.

pub mod client;
pub mod error;

pub use client::{parse_bucket_and_key, S3Client, S3Config};
pub use error::{StorageError, StorageResult};
