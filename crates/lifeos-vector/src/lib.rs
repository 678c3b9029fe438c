//! Qdrant-backed vector store for video memories.

pub mod error;
pub mod store;

pub use error::{VectorError, VectorResult};
pub use store::{SearchParams, VectorStore, VectorStoreConfig};
