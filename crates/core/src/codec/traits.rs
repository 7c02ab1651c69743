//! Trait definitions for the codec invoker.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::error::CodecError;

/// Result of a successful encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutput {
    pub output_path: PathBuf,
    pub size_bytes: u64,
    pub elapsed_ms: u64,
}

/// Runs the encoder and the duration probe against staged files.
///
/// Both operations are bound to `cancel`: once it fires, any external process
/// started for the call is killed.
#[async_trait]
pub trait Codec: Send + Sync {
    /// Returns the name of this codec implementation.
    fn name(&self) -> &str;

    /// Encode `input` into `output` with the fixed profile.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<TranscodeOutput, CodecError>;

    /// Duration of `path` in seconds, or `None` when it cannot be determined.
    /// Never fails.
    async fn probe_duration(&self, path: &Path, cancel: &CancellationToken) -> Option<f64>;

    /// Validates that the external tools are installed and runnable.
    async fn validate(&self) -> Result<(), CodecError>;
}
