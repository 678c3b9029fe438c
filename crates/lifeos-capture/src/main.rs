//! Camera and microphone capture binary.
//!
//! Opens the devices through FFmpeg demuxers, assembles fixed-duration
//! segments and feeds them to the Redis work queue.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lifeos_media::{
    capture::join_with_timeout, CaptureConfig, CaptureLoop, FfmpegCameraSource, FfmpegMicSource,
};
use lifeos_queue::SegmentQueue;

/// Capture threads get this long to stop before being abandoned.
const THREAD_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true))
        .with(EnvFilter::from_default_env().add_directive("lifeos=info".parse().unwrap()))
        .init();

    info!("Starting lifeos-capture");

    let config = CaptureConfig::from_env();
    info!(
        "Capture config: {}x{}@{}fps, {}s segments",
        config.resolution.0,
        config.resolution.1,
        config.fps,
        config.segment_duration.as_secs()
    );

    let queue = match SegmentQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create segment queue: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = queue.ping().await {
        error!("Queue broker unreachable: {}", e);
        std::process::exit(1);
    }

    let camera = match FfmpegCameraSource::open(
        &config.camera_input_format,
        &camera_device(&config),
        config.resolution,
        config.camera_fps,
    ) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open camera: {}", e);
            std::process::exit(1);
        }
    };

    let microphone = FfmpegMicSource::open(
        &config.audio_input_format,
        &config.audio_device,
        config.audio_sample_rate,
        config.audio_channels,
        config.audio_chunk_size,
    );

    let capture = CaptureLoop::new(config);
    let camera_handle = capture.spawn_camera_thread(Box::new(camera));
    let audio_handle = match microphone {
        Ok(source) => Some(capture.spawn_audio_thread(Box::new(source))),
        Err(e) => {
            warn!("Audio initialization failed, continuing with video only: {}", e);
            None
        }
    };

    let (jobs_tx, mut jobs_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Forward finished segments to the broker.
    let forwarder = tokio::spawn(async move {
        while let Some(job) = jobs_rx.recv().await {
            if let Err(e) = queue.push(&job).await {
                error!("Failed to enqueue segment: {}", e);
            }
        }
    });

    tokio::select! {
        _ = capture.run(jobs_tx, shutdown_rx) => {
            warn!("Capture loop ended on its own");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    }

    capture.stop();
    forwarder.await.ok();

    let joined = tokio::task::spawn_blocking(move || {
        let camera_ok = join_with_timeout(camera_handle, THREAD_JOIN_TIMEOUT);
        let audio_ok = audio_handle
            .map(|h| join_with_timeout(h, THREAD_JOIN_TIMEOUT))
            .unwrap_or(true);
        camera_ok && audio_ok
    })
    .await
    .unwrap_or(false);

    if !joined {
        warn!("Capture threads did not stop gracefully");
    }

    info!("Ingestion stopped");
}

fn camera_device(config: &CaptureConfig) -> String {
    match config.camera_input_format.as_str() {
        "avfoundation" => config.camera_index.to_string(),
        _ => format!("/dev/video{}", config.camera_index),
    }
}
