//! Capture loop and segment builder.
//!
//! A camera thread reads frames at the device rate and subsamples them into
//! a bounded drop-oldest buffer; an audio thread does the same for PCM
//! chunks. The async window assembler drains both buffers on an exact
//! wall-clock window and splices each window into one playable container via
//! FFmpeg child processes.

pub mod buffer;
pub mod builder;
pub mod capture;
pub mod command;
pub mod error;
pub mod frame;
pub mod source;

pub use buffer::DropOldestBuffer;
pub use builder::{SegmentBuilder, SegmentOutput};
pub use capture::{CaptureConfig, CaptureLoop};
pub use command::FfmpegCommand;
pub use error::{MediaError, MediaResult};
pub use frame::{AudioChunk, Frame};
pub use source::{AudioSource, FfmpegCameraSource, FfmpegMicSource, FrameSource};
