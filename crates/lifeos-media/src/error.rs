//! Media error types.

use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("FFmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("FFmpeg timed out after {0:?}")]
    FfmpegTimeout(std::time::Duration),

    #[error("Segment has no frames")]
    NoFrames,

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn ffmpeg(msg: impl Into<String>) -> Self {
        Self::Ffmpeg(msg.into())
    }

    pub fn camera_unavailable(msg: impl Into<String>) -> Self {
        Self::CameraUnavailable(msg.into())
    }
}
