//! FFmpeg-based codec implementation.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::CodecConfig;
use super::error::CodecError;
use super::profile::{encode_args, parse_duration_output, probe_args};
use super::traits::{Codec, TranscodeOutput};

/// Diagnostic output kept from a failed encode, in bytes.
const MAX_DIAGNOSTIC_LEN: usize = 8 * 1024;

/// FFmpeg-based codec implementation.
pub struct FfmpegCodec {
    config: CodecConfig,
}

impl FfmpegCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CodecConfig::default())
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn spawn_error(e: std::io::Error, path: &Path, ffprobe: bool) -> CodecError {
        if e.kind() != std::io::ErrorKind::NotFound {
            return CodecError::Io(e);
        }
        let path = path.to_path_buf();
        if ffprobe {
            CodecError::FfprobeNotFound { path }
        } else {
            CodecError::FfmpegNotFound { path }
        }
    }

    async fn check_version(&self, path: &Path, ffprobe: bool) -> Result<(), CodecError> {
        let output = Command::new(path)
            .arg("-version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Self::spawn_error(e, path, ffprobe))?;

        if !output.status.success() {
            return Err(CodecError::Io(std::io::Error::other(format!(
                "{} -version exited with {}",
                path.display(),
                output.status
            ))));
        }
        Ok(())
    }
}

/// stdout followed by stderr, keeping only the tail when it is long.
fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(stderr));
    let text = text.trim();

    if text.len() <= MAX_DIAGNOSTIC_LEN {
        return text.to_string();
    }
    let mut start = text.len() - MAX_DIAGNOSTIC_LEN;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

#[async_trait]
impl Codec for FfmpegCodec {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<TranscodeOutput, CodecError> {
        if !input.exists() {
            return Err(CodecError::InputNotFound {
                path: input.to_path_buf(),
            });
        }

        let start = Instant::now();
        let args = encode_args(input, output);
        debug!(ffmpeg = %self.config.ffmpeg_path.display(), args = ?args, "Starting encode");

        let child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::spawn_error(e, &self.config.ffmpeg_path, false))?;

        // Dropping the wait future drops the child, and kill_on_drop kills it.
        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = tokio::select! {
            res = timeout(timeout_duration, child.wait_with_output()) => res,
            _ = cancel.cancelled() => {
                warn!(input = %input.display(), "Encode cancelled, killing ffmpeg");
                return Err(CodecError::Cancelled);
            }
        };

        let process_output = match result {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => return Err(CodecError::Io(e)),
            Err(_) => {
                return Err(CodecError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        };

        if !process_output.status.success() {
            return Err(CodecError::encode_failed(
                process_output.status.to_string(),
                combined_output(&process_output.stdout, &process_output.stderr),
            ));
        }

        let meta = tokio::fs::metadata(output)
            .await
            .map_err(|_| CodecError::OutputMissing {
                path: output.to_path_buf(),
            })?;

        Ok(TranscodeOutput {
            output_path: output.to_path_buf(),
            size_bytes: meta.len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn probe_duration(&self, path: &Path, cancel: &CancellationToken) -> Option<f64> {
        let run = Command::new(&self.config.ffprobe_path)
            .args(probe_args(path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let probe_timeout = Duration::from_secs(self.config.probe_timeout_secs);
        let result = tokio::select! {
            res = timeout(probe_timeout, run) => res,
            _ = cancel.cancelled() => return None,
        };

        match result {
            Ok(Ok(out)) if out.status.success() => {
                let stdout = String::from_utf8_lossy(&out.stdout);
                let duration = parse_duration_output(&stdout);
                if duration.is_none() {
                    warn!(path = %path.display(), output = %stdout.trim(), "Unparseable ffprobe duration");
                }
                duration
            }
            Ok(Ok(out)) => {
                warn!(
                    path = %path.display(),
                    status = %out.status,
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "ffprobe failed"
                );
                None
            }
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "Failed to run ffprobe");
                None
            }
            Err(_) => {
                warn!(path = %path.display(), "ffprobe timed out");
                None
            }
        }
    }

    async fn validate(&self) -> Result<(), CodecError> {
        self.check_version(&self.config.ffmpeg_path, false).await?;
        self.check_version(&self.config.ffprobe_path, true).await?;
        Ok(())
    }
}
