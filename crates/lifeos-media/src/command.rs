//! FFmpeg invocation helpers.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for one FFmpeg run.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    args: Vec<String>,
}

impl FfmpegCommand {
    /// Create a command with the shared flags: quiet logs, overwrite output.
    pub fn new() -> Self {
        Self {
            args: vec![
                "-hide_banner".to_string(),
                "-loglevel".to_string(),
                "error".to_string(),
                "-y".to_string(),
            ],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run to completion with a deadline; the process is killed on timeout.
    pub async fn run(self, timeout: Duration) -> MediaResult<()> {
        debug!("ffmpeg {}", self.args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child.stderr.take();

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("FFmpeg exceeded {:?}, killing", timeout);
                child.kill().await.ok();
                return Err(MediaError::FfmpegTimeout(timeout));
            }
        };

        if status.success() {
            Ok(())
        } else {
            let detail = match stderr {
                Some(mut pipe) => {
                    use tokio::io::AsyncReadExt;
                    let mut buf = String::new();
                    pipe.read_to_string(&mut buf).await.ok();
                    buf.trim().to_string()
                }
                None => String::new(),
            };
            Err(MediaError::ffmpeg(format!(
                "exit {}: {}",
                status.code().unwrap_or(-1),
                detail
            )))
        }
    }

    /// Spawn with a piped stdin for streaming raw frames in.
    pub fn spawn_writer(self) -> MediaResult<FfmpegWriter> {
        debug!("ffmpeg {} (piped stdin)", self.args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::ffmpeg("no stdin pipe"))?;

        Ok(FfmpegWriter { child, stdin })
    }
}

impl Default for FfmpegCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a running encode that consumes raw frames on stdin.
pub struct FfmpegWriter {
    child: Child,
    stdin: ChildStdin,
}

impl FfmpegWriter {
    pub async fn write(&mut self, bytes: &[u8]) -> MediaResult<()> {
        self.stdin.write_all(bytes).await?;
        Ok(())
    }

    /// Close stdin and wait for the encoder to flush.
    pub async fn finish(mut self) -> MediaResult<()> {
        self.stdin.shutdown().await?;
        drop(self.stdin);

        let status = self.child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg(format!(
                "encoder exit {}",
                status.code().unwrap_or(-1)
            )))
        }
    }
}
