//! Mock codec for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::codec::{Codec, CodecError, TranscodeOutput};

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    Fail(String),
    Hang,
}

#[derive(Debug)]
struct State {
    behavior: Behavior,
    /// Failures to inject before falling back to `behavior`.
    fail_next: Option<(u32, String)>,
    duration: Option<f64>,
    delay: Duration,
    valid: bool,
    inputs: Vec<PathBuf>,
}

/// Mock implementation of the Codec trait.
///
/// Provides controllable behavior for testing:
/// - Writes a fixed artifact instead of running ffmpeg
/// - Simulates encoder failures, once or permanently
/// - Hangs until cancelled, to exercise deadlines
/// - Counts and records every transcode call
#[derive(Debug, Clone)]
pub struct MockCodec {
    state: Arc<Mutex<State>>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCodec {
    /// Bytes written as the encoded output.
    pub const DEFAULT_OUTPUT: &'static [u8] = b"mock hevc/aac mp4 output";

    /// Duration reported by the probe unless overridden.
    pub const DEFAULT_DURATION: f64 = 12.5;

    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                behavior: Behavior::Succeed,
                fail_next: None,
                duration: Some(Self::DEFAULT_DURATION),
                delay: Duration::ZERO,
                valid: true,
                inputs: Vec::new(),
            })),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every transcode fails with `output` as the encoder's diagnostic text.
    pub fn fail_with(&self, output: impl Into<String>) {
        self.state().behavior = Behavior::Fail(output.into());
    }

    /// The next `times` transcodes fail, later ones follow the configured behavior.
    pub fn fail_next(&self, times: u32, output: impl Into<String>) {
        self.state().fail_next = Some((times, output.into()));
    }

    /// Transcodes succeed again.
    pub fn succeed(&self) {
        let mut state = self.state();
        state.behavior = Behavior::Succeed;
        state.fail_next = None;
    }

    /// Transcodes block until their cancellation token fires.
    pub fn hang(&self) {
        self.state().behavior = Behavior::Hang;
    }

    /// Duration returned by the probe; `None` simulates an unparseable result.
    pub fn set_duration(&self, duration: Option<f64>) {
        self.state().duration = duration;
    }

    /// Simulated encode time for successful transcodes.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = delay;
    }

    /// Whether `validate` reports the tools as installed.
    pub fn set_valid(&self, valid: bool) {
        self.state().valid = valid;
    }

    pub fn transcode_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Input paths of every transcode call, in order.
    pub fn recorded_inputs(&self) -> Vec<PathBuf> {
        self.state().inputs.clone()
    }

    /// Decide what this call does, consuming one injected failure if any.
    fn next_behavior(&self, input: &Path) -> (Behavior, Duration) {
        let mut state = self.state();
        state.inputs.push(input.to_path_buf());

        if let Some((remaining, output)) = state.fail_next.take() {
            if remaining > 0 {
                if remaining > 1 {
                    state.fail_next = Some((remaining - 1, output.clone()));
                }
                return (Behavior::Fail(output), Duration::ZERO);
            }
        }
        (state.behavior.clone(), state.delay)
    }
}

#[async_trait]
impl Codec for MockCodec {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<TranscodeOutput, CodecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();

        if !input.exists() {
            return Err(CodecError::InputNotFound {
                path: input.to_path_buf(),
            });
        }

        let (behavior, delay) = self.next_behavior(input);
        match behavior {
            Behavior::Fail(text) => return Err(CodecError::encode_failed("exit status: 1", text)),
            Behavior::Hang => {
                cancel.cancelled().await;
                return Err(CodecError::Cancelled);
            }
            Behavior::Succeed => {}
        }

        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(CodecError::Cancelled),
            }
        }

        tokio::fs::write(output, Self::DEFAULT_OUTPUT).await?;

        Ok(TranscodeOutput {
            output_path: output.to_path_buf(),
            size_bytes: Self::DEFAULT_OUTPUT.len() as u64,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn probe_duration(&self, _path: &Path, _cancel: &CancellationToken) -> Option<f64> {
        self.state().duration
    }

    async fn validate(&self) -> Result<(), CodecError> {
        if self.state().valid {
            Ok(())
        } else {
            Err(CodecError::FfmpegNotFound {
                path: PathBuf::from("ffmpeg"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_output_and_counts_calls() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.mov");
        let output = dir.path().join("output.mp4");
        std::fs::write(&input, b"src").unwrap();

        let codec = MockCodec::new();
        let result = codec
            .transcode(&input, &output, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.size_bytes, MockCodec::DEFAULT_OUTPUT.len() as u64);
        assert_eq!(std::fs::read(&output).unwrap(), MockCodec::DEFAULT_OUTPUT);
        assert_eq!(codec.transcode_calls(), 1);
        assert_eq!(codec.recorded_inputs(), vec![input]);
    }

    #[tokio::test]
    async fn test_fail_next_then_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.mov");
        let output = dir.path().join("output.mp4");
        std::fs::write(&input, b"src").unwrap();
        let cancel = CancellationToken::new();

        let codec = MockCodec::new();
        codec.fail_next(2, "boom");

        assert!(codec.transcode(&input, &output, &cancel).await.is_err());
        assert!(codec.transcode(&input, &output, &cancel).await.is_err());
        assert!(codec.transcode(&input, &output, &cancel).await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_and_validate() {
        let codec = MockCodec::new();
        let cancel = CancellationToken::new();
        assert_eq!(
            codec.probe_duration(Path::new("x"), &cancel).await,
            Some(MockCodec::DEFAULT_DURATION)
        );
        codec.set_duration(None);
        assert_eq!(codec.probe_duration(Path::new("x"), &cancel).await, None);

        assert!(codec.validate().await.is_ok());
        codec.set_valid(false);
        assert!(codec.validate().await.is_err());
    }
}
