//! Segment builder: one window of frames and PCM in, one playable
//! container out.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use lifeos_models::SegmentMetadata;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::frame::{AudioChunk, Frame};

/// Deadline for the mux step; on expiry the video-only file is used.
const MUX_TIMEOUT: Duration = Duration::from_secs(15);
/// Deadline for the video-only encode.
const ENCODE_TIMEOUT: Duration = Duration::from_secs(60);

/// Segment builder configuration.
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    pub fps: u32,
    pub resolution: (u32, u32),
    pub segment_duration_secs: u32,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
    pub user_id: Option<Uuid>,
}

/// A finished segment: the container path plus queue metadata.
#[derive(Debug, Clone)]
pub struct SegmentOutput {
    pub video_path: PathBuf,
    pub metadata: SegmentMetadata,
}

impl SegmentBuilder {
    /// Target frame count for a full window.
    pub fn expected_frames(&self) -> usize {
        (self.fps * self.segment_duration_secs) as usize
    }

    /// Build one container from a window of samples.
    ///
    /// Short windows are padded by duplicating the last frame up to the
    /// target count; the video-understanding API rejects clips under four
    /// seconds. Any failure releases the temporaries and the segment is
    /// dropped by the caller, not re-queued.
    pub async fn build(
        &self,
        mut frames: Vec<Frame>,
        audio: Vec<AudioChunk>,
        segment_id: u64,
    ) -> MediaResult<SegmentOutput> {
        if frames.is_empty() {
            return Err(MediaError::NoFrames);
        }

        pad_frames(&mut frames, self.expected_frames(), self.fps);

        let video_path = temp_segment_path(segment_id)?;

        if let Err(e) = self.encode_video(&frames, &video_path).await {
            remove_quietly(&video_path);
            return Err(e);
        }

        let (final_path, has_audio) = if audio.is_empty() {
            (video_path, false)
        } else {
            match self.mux_audio(&video_path, &audio, segment_id).await {
                Ok(muxed_path) => {
                    remove_quietly(&video_path);
                    (muxed_path, true)
                }
                Err(e) => {
                    warn!("Mux failed, falling back to video-only: {}", e);
                    (video_path, false)
                }
            }
        };

        let frame_count = frames.len();
        let metadata = SegmentMetadata {
            segment_id,
            fps: self.fps,
            resolution: self.resolution,
            frame_count,
            duration_seconds: frame_count as f64 / self.fps as f64,
            audio_chunks: audio.len(),
            has_audio,
            captured_at: Utc::now(),
            user_id: self.user_id,
        };

        info!(
            segment_id,
            frames = frame_count,
            has_audio,
            path = %final_path.display(),
            "Built segment"
        );

        Ok(SegmentOutput {
            video_path: final_path,
            metadata,
        })
    }

    /// Encode the frame window into a video-only H.264 container.
    async fn encode_video(&self, frames: &[Frame], output: &Path) -> MediaResult<()> {
        let size = format!("{}x{}", self.resolution.0, self.resolution.1);
        let command = FfmpegCommand::new().args([
            "-f",
            "rawvideo",
            "-pix_fmt",
            "bgr24",
            "-s",
            &size,
            "-r",
            &self.fps.to_string(),
            "-i",
            "-",
            "-c:v",
            "libx264",
            "-preset",
            "ultrafast",
            "-crf",
            "28",
            "-pix_fmt",
            "yuv420p",
            &output.to_string_lossy(),
        ]);

        let mut writer = command.spawn_writer()?;
        for frame in frames {
            writer.write(&frame.data).await?;
        }

        tokio::time::timeout(ENCODE_TIMEOUT, writer.finish())
            .await
            .map_err(|_| MediaError::FfmpegTimeout(ENCODE_TIMEOUT))?
    }

    /// Write the PCM window as WAV and mux it with the encoded video.
    async fn mux_audio(
        &self,
        video_path: &Path,
        audio: &[AudioChunk],
        segment_id: u64,
    ) -> MediaResult<PathBuf> {
        let audio_path = temp_path(segment_id, "wav")?;
        let muxed_path = temp_segment_path(segment_id)?;

        let write_result = self.write_wav(&audio_path, audio).await;
        if let Err(e) = write_result {
            remove_quietly(&audio_path);
            remove_quietly(&muxed_path);
            return Err(e);
        }

        let command = FfmpegCommand::new().args([
            "-i",
            &video_path.to_string_lossy(),
            "-i",
            &audio_path.to_string_lossy(),
            "-c:v",
            "libx264",
            "-preset",
            "ultrafast",
            "-crf",
            "28",
            "-c:a",
            "aac",
            "-shortest",
            "-threads",
            "0",
            &muxed_path.to_string_lossy(),
        ]);

        match command.run(MUX_TIMEOUT).await {
            Ok(()) => {
                remove_quietly(&audio_path);
                Ok(muxed_path)
            }
            Err(e) => {
                remove_quietly(&audio_path);
                remove_quietly(&muxed_path);
                Err(e)
            }
        }
    }

    async fn write_wav(&self, path: &Path, audio: &[AudioChunk]) -> MediaResult<()> {
        let spec = hound::WavSpec {
            channels: self.audio_channels,
            sample_rate: self.audio_sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let path = path.to_path_buf();
        let pcm: Vec<u8> = audio.iter().flat_map(|c| c.data.iter().copied()).collect();

        tokio::task::spawn_blocking(move || -> MediaResult<()> {
            let mut writer = hound::WavWriter::create(&path, spec)?;
            for sample in pcm.chunks_exact(2) {
                writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
            }
            writer.finalize()?;
            Ok(())
        })
        .await
        .map_err(|e| MediaError::ffmpeg(format!("WAV writer panicked: {}", e)))?
    }
}

/// Duplicate the last frame until `target` frames exist, advancing the
/// synthetic timestamps by one frame interval each.
fn pad_frames(frames: &mut Vec<Frame>, target: usize, fps: u32) {
    if frames.len() >= target || frames.is_empty() {
        return;
    }

    let last = frames
        .last()
        .expect("non-empty checked above")
        .clone();
    let original = frames.len();
    for i in original..target {
        let offset = (i - original + 1) as f64 / fps as f64;
        frames.push(Frame::new(last.data.clone(), last.captured_at + offset));
    }
}

fn temp_segment_path(segment_id: u64) -> MediaResult<PathBuf> {
    temp_path(segment_id, "mp4")
}

fn temp_path(segment_id: u64, extension: &str) -> MediaResult<PathBuf> {
    let path = tempfile::Builder::new()
        .prefix(&format!("lifeos_segment_{}_", segment_id))
        .suffix(&format!(".{}", extension))
        .tempfile()?
        .into_temp_path()
        .keep()
        .map_err(|e| MediaError::Io(e.error))?;
    Ok(path)
}

fn remove_quietly(path: &Path) {
    std::fs::remove_file(path).ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SegmentBuilder {
        SegmentBuilder {
            fps: 10,
            resolution: (4, 4),
            segment_duration_secs: 10,
            audio_sample_rate: 44100,
            audio_channels: 1,
            user_id: None,
        }
    }

    fn frame(at: f64) -> Frame {
        Frame::new(vec![0u8; Frame::byte_len(4, 4)], at)
    }

    #[test]
    fn expected_frames_is_fps_times_duration() {
        assert_eq!(builder().expected_frames(), 100);
    }

    #[test]
    fn short_window_is_padded_to_target() {
        let mut frames: Vec<Frame> = (0..37).map(|i| frame(i as f64 * 0.1)).collect();
        pad_frames(&mut frames, 100, 10);
        assert_eq!(frames.len(), 100);

        // Padding repeats the last frame with advancing timestamps.
        let last_real = 36.0 * 0.1;
        assert!((frames[37].captured_at - (last_real + 0.1)).abs() < 1e-9);
        assert!((frames[99].captured_at - (last_real + 6.3)).abs() < 1e-9);
    }

    #[test]
    fn full_window_is_left_alone() {
        let mut frames: Vec<Frame> = (0..100).map(|i| frame(i as f64 * 0.1)).collect();
        pad_frames(&mut frames, 100, 10);
        assert_eq!(frames.len(), 100);
    }

    #[test]
    fn empty_window_stays_empty() {
        let mut frames: Vec<Frame> = Vec::new();
        pad_frames(&mut frames, 100, 10);
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn build_rejects_empty_window() {
        let result = builder().build(Vec::new(), Vec::new(), 0).await;
        assert!(matches!(result, Err(MediaError::NoFrames)));
    }
}
