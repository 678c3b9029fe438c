//! Frame and audio sources.
//!
//! The capture threads consume these blocking traits; the shipped
//! implementations read raw streams from FFmpeg device demuxers so no
//! native camera SDK is linked. `Ok(None)` means end of stream.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::error::{MediaError, MediaResult};
use crate::frame::{AudioChunk, Frame};

/// Blocking source of raw frames, owned by the camera thread.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> MediaResult<Option<Frame>>;
}

/// Blocking source of PCM chunks, owned by the audio thread.
pub trait AudioSource: Send {
    fn read_chunk(&mut self) -> MediaResult<Option<AudioChunk>>;
}

fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Camera frames via an FFmpeg device demuxer emitting rawvideo BGR24.
pub struct FfmpegCameraSource {
    child: Child,
    stdout: std::process::ChildStdout,
    frame_len: usize,
}

impl FfmpegCameraSource {
    /// Open the capture device. `input_format` selects the demuxer
    /// (`v4l2`, `avfoundation`) and `device` the input specifier
    /// (`/dev/video0`, `0`). The camera runs at its native rate; the
    /// capture thread subsamples down to the target fps.
    pub fn open(
        input_format: &str,
        device: &str,
        resolution: (u32, u32),
        camera_fps: u32,
    ) -> MediaResult<Self> {
        let size = format!("{}x{}", resolution.0, resolution.1);
        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                input_format,
                "-framerate",
                &camera_fps.to_string(),
                "-video_size",
                &size,
                "-i",
                device,
                "-f",
                "rawvideo",
                "-pix_fmt",
                "bgr24",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::camera_unavailable(format!("{}: {}", device, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::camera_unavailable("no capture pipe"))?;

        info!(
            "Camera opened: {} via {} at {}@{}fps",
            device, input_format, size, camera_fps
        );

        Ok(Self {
            child,
            stdout,
            frame_len: Frame::byte_len(resolution.0, resolution.1),
        })
    }
}

impl FrameSource for FfmpegCameraSource {
    fn read_frame(&mut self) -> MediaResult<Option<Frame>> {
        let mut data = vec![0u8; self.frame_len];
        match self.stdout.read_exact(&mut data) {
            Ok(()) => Ok(Some(Frame::new(data, epoch_now()))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for FfmpegCameraSource {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

/// Microphone PCM via an FFmpeg device demuxer emitting s16le.
pub struct FfmpegMicSource {
    child: Child,
    stdout: std::process::ChildStdout,
    chunk_len: usize,
}

impl FfmpegMicSource {
    /// Open the default input device. `chunk_size` is in samples per
    /// channel, matching the segment builder's WAV expectations.
    pub fn open(
        input_format: &str,
        device: &str,
        sample_rate: u32,
        channels: u16,
        chunk_size: usize,
    ) -> MediaResult<Self> {
        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-f",
                input_format,
                "-i",
                device,
                "-f",
                "s16le",
                "-ac",
                &channels.to_string(),
                "-ar",
                &sample_rate.to_string(),
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::camera_unavailable(format!("audio {}: {}", device, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::camera_unavailable("no audio pipe"))?;

        info!(
            "Microphone opened: {} via {} at {}Hz/{}ch",
            device, input_format, sample_rate, channels
        );

        Ok(Self {
            child,
            stdout,
            chunk_len: chunk_size * channels as usize * 2,
        })
    }
}

impl AudioSource for FfmpegMicSource {
    fn read_chunk(&mut self) -> MediaResult<Option<AudioChunk>> {
        let mut data = vec![0u8; self.chunk_len];
        match self.stdout.read_exact(&mut data) {
            Ok(()) => Ok(Some(AudioChunk::new(data, epoch_now()))),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for FfmpegMicSource {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}
