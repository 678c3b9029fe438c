//! Capture loop: device threads, window assembly, segment handoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use lifeos_models::SegmentJob;

use crate::buffer::DropOldestBuffer;
use crate::builder::SegmentBuilder;
use crate::frame::{AudioChunk, Frame};
use crate::source::{AudioSource, FrameSource};

/// Window close tolerance.
const WINDOW_EPSILON: Duration = Duration::from_millis(10);

/// Capture configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Emitted frame rate after subsampling.
    pub fps: u32,
    pub resolution: (u32, u32),
    pub segment_duration: Duration,
    /// Camera-native rate.
    pub camera_fps: u32,
    pub camera_index: u32,
    /// FFmpeg device demuxer for video (`v4l2`, `avfoundation`).
    pub camera_input_format: String,
    /// FFmpeg device demuxer for audio (`alsa`, `avfoundation`).
    pub audio_input_format: String,
    pub audio_device: String,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
    pub audio_chunk_size: usize,
    pub frame_buffer_capacity: usize,
    pub audio_buffer_capacity: usize,
    pub user_id: Option<Uuid>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            resolution: (1280, 720),
            segment_duration: Duration::from_secs(10),
            camera_fps: 30,
            camera_index: 0,
            camera_input_format: "v4l2".to_string(),
            audio_input_format: "alsa".to_string(),
            audio_device: "default".to_string(),
            audio_sample_rate: 44100,
            audio_channels: 1,
            audio_chunk_size: 1024,
            frame_buffer_capacity: 100,
            audio_buffer_capacity: 200,
            user_id: None,
        }
    }
}

impl CaptureConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fps: env_parse("CAPTURE_FPS", defaults.fps),
            resolution: (
                env_parse("CAPTURE_WIDTH", defaults.resolution.0),
                env_parse("CAPTURE_HEIGHT", defaults.resolution.1),
            ),
            segment_duration: Duration::from_secs(env_parse(
                "SEGMENT_DURATION_SECS",
                defaults.segment_duration.as_secs(),
            )),
            camera_fps: env_parse("CAMERA_FPS", defaults.camera_fps),
            camera_index: env_parse("CAMERA_INDEX", defaults.camera_index),
            camera_input_format: std::env::var("CAMERA_INPUT_FORMAT")
                .unwrap_or(defaults.camera_input_format),
            audio_input_format: std::env::var("AUDIO_INPUT_FORMAT")
                .unwrap_or(defaults.audio_input_format),
            audio_device: std::env::var("AUDIO_DEVICE").unwrap_or(defaults.audio_device),
            audio_sample_rate: env_parse("AUDIO_SAMPLE_RATE", defaults.audio_sample_rate),
            audio_channels: env_parse("AUDIO_CHANNELS", defaults.audio_channels),
            audio_chunk_size: env_parse("AUDIO_CHUNK_SIZE", defaults.audio_chunk_size),
            frame_buffer_capacity: defaults.frame_buffer_capacity,
            audio_buffer_capacity: defaults.audio_buffer_capacity,
            user_id: std::env::var("CAPTURE_USER_ID")
                .ok()
                .and_then(|s| Uuid::parse_str(&s).ok()),
        }
    }

    pub fn segment_builder(&self) -> SegmentBuilder {
        SegmentBuilder {
            fps: self.fps,
            resolution: self.resolution,
            segment_duration_secs: self.segment_duration.as_secs() as u32,
            audio_sample_rate: self.audio_sample_rate,
            audio_channels: self.audio_channels,
            user_id: self.user_id,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// The capture loop. Device threads feed the bounded buffers; the async
/// window assembler drains them on an exact wall-clock schedule.
pub struct CaptureLoop {
    config: CaptureConfig,
    builder: SegmentBuilder,
    frames: Arc<DropOldestBuffer<Frame>>,
    audio: Arc<DropOldestBuffer<AudioChunk>>,
    running: Arc<AtomicBool>,
}

impl CaptureLoop {
    pub fn new(config: CaptureConfig) -> Self {
        let builder = config.segment_builder();
        let frames = Arc::new(DropOldestBuffer::new(config.frame_buffer_capacity));
        let audio = Arc::new(DropOldestBuffer::new(config.audio_buffer_capacity));
        Self {
            config,
            builder,
            frames,
            audio,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Spawn the camera thread. Frames arrive at the device rate and are
    /// subsampled by timestamp gating down to the target fps; the thread
    /// never blocks on the scheduler.
    pub fn spawn_camera_thread(
        &self,
        mut source: Box<dyn FrameSource>,
    ) -> std::thread::JoinHandle<()> {
        let buffer = Arc::clone(&self.frames);
        let running = Arc::clone(&self.running);
        let interval = 1.0 / self.config.fps as f64;

        std::thread::spawn(move || {
            let mut last_emit = 0.0_f64;
            while running.load(Ordering::Relaxed) {
                match source.read_frame() {
                    Ok(Some(frame)) => {
                        if should_emit(last_emit, frame.captured_at, interval) {
                            last_emit = frame.captured_at;
                            buffer.push(frame);
                        }
                    }
                    Ok(None) => {
                        warn!("Camera stream ended");
                        break;
                    }
                    Err(e) => {
                        error!("Frame capture error: {}", e);
                        std::thread::sleep(Duration::from_millis(100));
                    }
                }
            }
            info!("Frame capture thread stopped");
        })
    }

    /// Spawn the audio thread. Every chunk is kept; overflow drops oldest.
    pub fn spawn_audio_thread(
        &self,
        mut source: Box<dyn AudioSource>,
    ) -> std::thread::JoinHandle<()> {
        let buffer = Arc::clone(&self.audio);
        let running = Arc::clone(&self.running);

        std::thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                match source.read_chunk() {
                    Ok(Some(chunk)) => {
                        buffer.push(chunk);
                    }
                    Ok(None) => {
                        warn!("Audio stream ended");
                        break;
                    }
                    Err(e) => {
                        error!("Audio capture error: {}", e);
                        std::thread::sleep(Duration::from_millis(100));
                    }
                }
            }
            info!("Audio capture thread stopped");
        })
    }

    /// Assemble windows of exactly `segment_duration` and hand finished
    /// jobs to the sender. A failed build drops the segment and the next
    /// window proceeds.
    pub async fn run(&self, jobs: mpsc::Sender<SegmentJob>, shutdown: watch::Receiver<bool>) {
        let mut segment_id = 0u64;

        while !*shutdown.borrow() && self.running.load(Ordering::Relaxed) {
            let deadline = Instant::now() + self.config.segment_duration - WINDOW_EPSILON;
            let mut window_frames: Vec<Frame> = Vec::with_capacity(self.builder.expected_frames());
            let mut window_audio: Vec<AudioChunk> = Vec::new();

            while Instant::now() < deadline {
                if *shutdown.borrow() || !self.running.load(Ordering::Relaxed) {
                    break;
                }

                let frames = self.frames.drain_up_to(10);
                let audio = self.audio.drain_up_to(5);
                let collected = frames.len() + audio.len();
                window_frames.extend(frames);
                window_audio.extend(audio);

                // Short sleeps keep the window close within tolerance.
                if collected == 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                } else {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                }
            }

            if window_frames.is_empty() {
                continue;
            }

            match self
                .builder
                .build(window_frames, window_audio, segment_id)
                .await
            {
                Ok(output) => {
                    let job = SegmentJob::new(
                        output.video_path.to_string_lossy().to_string(),
                        output.metadata,
                    );
                    if jobs.send(job).await.is_err() {
                        warn!("Job channel closed, stopping capture");
                        break;
                    }
                }
                Err(e) => {
                    error!("Segment {} dropped: {}", segment_id, e);
                }
            }

            segment_id += 1;
        }

        info!("Capture loop stopped after {} segments", segment_id);
    }

    /// Signal the device threads to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

/// Timestamp gate: emit when at least one frame interval has elapsed since
/// the last emitted frame.
fn should_emit(last_emit: f64, now: f64, interval: f64) -> bool {
    now - last_emit >= interval
}

/// Join a capture thread, abandoning it after `timeout`.
pub fn join_with_timeout(handle: std::thread::JoinHandle<()>, timeout: Duration) -> bool {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        handle.join().ok();
        tx.send(()).ok();
    });
    match rx.recv_timeout(timeout) {
        Ok(()) => true,
        Err(_) => {
            warn!("Capture thread did not stop within {:?}, abandoning", timeout);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_subsamples_to_target_rate() {
        let interval = 0.1; // 10 fps target
        let mut last = 0.0;
        let mut emitted = 0;

        // 30 fps camera for one second.
        for i in 0..30 {
            let now = i as f64 / 30.0;
            if should_emit(last, now, interval) {
                last = now;
                emitted += 1;
            }
        }
        assert!((9..=11).contains(&emitted), "emitted {}", emitted);
    }

    #[test]
    fn gate_passes_everything_when_camera_is_slow() {
        let interval = 0.1;
        let mut last = 0.0;
        let mut emitted = 0;

        // 5 fps camera: every frame spaced wider than the gate.
        for i in 1..=5 {
            let now = i as f64 / 5.0;
            if should_emit(last, now, interval) {
                last = now;
                emitted += 1;
            }
        }
        assert_eq!(emitted, 5);
    }

    #[test]
    fn config_defaults_match_capture_contract() {
        let config = CaptureConfig::default();
        assert_eq!(config.fps, 10);
        assert_eq!(config.segment_duration, Duration::from_secs(10));
        assert_eq!(config.frame_buffer_capacity, 100);
        assert_eq!(config.audio_buffer_capacity, 200);
        assert_eq!(config.segment_builder().expected_frames(), 100);
    }

    #[test]
    fn join_with_timeout_reports_completion() {
        let handle = std::thread::spawn(|| {});
        assert!(join_with_timeout(handle, Duration::from_secs(1)));
    }
}
