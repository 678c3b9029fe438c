//! Segment processing workers and downstream automations.

pub mod automation;
pub mod config;
pub mod error;
pub mod pool;
pub mod services;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use pool::WorkerPool;
pub use services::Services;
pub use worker::Worker;
