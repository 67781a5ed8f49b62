//! yt-dlp download backend.
//!
//! yt-dlp is told to hand the transfer to ffmpeg with `-progress -`, so its
//! stdout becomes a stream of `key=value` progress blocks (see
//! [`progress`](super::progress)). Each completed block is fed to a
//! [`StallDetector`]; a stalled transfer is killed and reported as a
//! recoverable error.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::progress::{LineKind, ProgressState, StallDetector, StallThresholds};
use super::remux::command_line;
use crate::error::DownloadError;
use crate::extract::MediaDescriptor;

/// stderr marker of a dropped connection, worth retrying elsewhere.
const CONNECTION_ABORTED: &str = "'Connection aborted.'";

/// How often a silent downloader is checked for a stall.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// Saves a resolved stream to disk.
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    async fn download(&self, descriptor: &MediaDescriptor, output: &Path) -> Result<(), DownloadError>;
}

/// Runs yt-dlp with ffmpeg as the downloader.
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    program: PathBuf,
    stall: StallThresholds,
}

impl YtDlpBackend {
    pub fn new(program: impl Into<PathBuf>, stall: StallThresholds) -> Self {
        Self {
            program: program.into(),
            stall,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Argument vector for one attempt. The referer defaults to the media
    /// URL itself.
    pub fn build_args(descriptor: &MediaDescriptor, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "--ignore-config",
            "--no-warnings",
            "--no-check-certificate",
            "--abort-on-unavailable-fragments",
            "--retries",
            "infinite",
            "--downloader",
            "ffmpeg",
            "--downloader-args",
            "-hide_banner -loglevel error -progress - -nostats",
            "--referer",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        args.push(descriptor.referer().unwrap_or(descriptor.url()).to_string());
        for header in descriptor.headers() {
            args.push("--add-header".into());
            args.push(header.clone());
        }
        args.push("--output".into());
        args.push(output.to_string_lossy().into_owned());
        args.push(descriptor.url().to_string());
        args
    }
}

#[async_trait]
impl DownloadBackend for YtDlpBackend {
    async fn download(&self, descriptor: &MediaDescriptor, output: &Path) -> Result<(), DownloadError> {
        let args = Self::build_args(descriptor, output);
        let command = command_line(&self.program, &args);
        debug!("Running {}", command);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DownloadError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("downloader stdout not captured"))?;
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        info!("Waiting for download progress...");
        let mut lines = BufReader::new(stdout).lines();
        let mut state = ProgressState::default();
        let mut detector = StallDetector::new(self.stall.clone(), Instant::now());

        loop {
            let Ok(next) = tokio::time::timeout(IDLE_POLL, lines.next_line()).await else {
                if let Some(kind) = detector.idle(Instant::now()) {
                    warn!("{} with no output, abandoning source", kind);
                    if let Err(e) = child.kill().await {
                        debug!("Kill failed: {}", e);
                    }
                    return Err(DownloadError::Stalled(kind));
                }
                continue;
            };
            let Some(line) = next? else { break };
            if line.starts_with('[') {
                debug!("{}", line);
                continue;
            }
            if state.feed_line(&line) != LineKind::EndOfBlock {
                continue;
            }
            if let Some(kind) = detector.observe(&state, Instant::now()) {
                warn!("{}, abandoning source", kind);
                if let Err(e) = child.kill().await {
                    debug!("Kill failed: {}", e);
                }
                return Err(DownloadError::Stalled(kind));
            }
            debug!("{}", state);
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }
        if stderr.contains(CONNECTION_ABORTED) {
            info!("Connection aborted. Discarding URL");
            return Err(DownloadError::ConnectionAborted);
        }
        Err(DownloadError::Failed {
            command,
            code: status.code(),
            stderr: stderr.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_default_referer_to_url() {
        let descriptor = MediaDescriptor::new("https://cdn.test/v.mp4").unwrap();
        let args = YtDlpBackend::build_args(&descriptor, Path::new("ep1.mp4"));
        let referer = args.iter().position(|a| a == "--referer").unwrap();
        assert_eq!(args[referer + 1], "https://cdn.test/v.mp4");
        assert_eq!(args.last().unwrap(), "https://cdn.test/v.mp4");
        assert!(!args.contains(&"--add-header".to_string()));
    }

    #[test]
    fn args_carry_headers_in_order() {
        let descriptor = MediaDescriptor::new("https://cdn.test/master.m3u8")
            .unwrap()
            .with_referer("https://watchsb.com/")
            .with_headers(vec!["Accept: */*".into(), "Origin: https://watchsb.com".into()]);
        let args = YtDlpBackend::build_args(&descriptor, Path::new("/tmp/out.mp4"));
        assert_eq!(
            &args[9..],
            [
                "-hide_banner -loglevel error -progress - -nostats",
                "--referer",
                "https://watchsb.com/",
                "--add-header",
                "Accept: */*",
                "--add-header",
                "Origin: https://watchsb.com",
                "--output",
                "/tmp/out.mp4",
                "https://cdn.test/master.m3u8",
            ]
        );
        assert_eq!(args[0], "--ignore-config");
    }
}
