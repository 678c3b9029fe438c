//! Redis-backed FIFO of pending segment jobs.

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::{QueueConfig, SegmentQueue};
