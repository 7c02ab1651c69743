//! Error types for the codec invoker.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while transcoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The encoder exited with a non-zero status. `output` is its combined
    /// stdout and stderr.
    #[error("ffmpeg transcoding failed ({status}): {output}")]
    EncodeFailed { status: String, output: String },

    /// The encoder reported success but left no output file.
    #[error("Output file not created: {path}")]
    OutputMissing { path: PathBuf },

    /// Encode timed out.
    #[error("Transcode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The delivery was cancelled while the encoder was running.
    #[error("Transcode cancelled")]
    Cancelled,

    /// I/O error while running the tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub fn encode_failed(status: impl Into<String>, output: impl Into<String>) -> Self {
        Self::EncodeFailed {
            status: status.into(),
            output: output.into(),
        }
    }
}
