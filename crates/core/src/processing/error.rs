use thiserror::Error;

use crate::codec::CodecError;
use crate::events::EventBusError;
use crate::media::MediaStoreError;
use crate::stage::StageError;

/// Why handling an event failed.
///
/// The `Display` text is what ends up in the job's `error_message`.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// No media row exists for the event. Redelivery cannot fix this.
    #[error("media not found: {0}")]
    MediaNotFound(String),

    #[error(transparent)]
    InvalidEvent(#[from] EventBusError),

    #[error("media ledger update failed: {0}")]
    Ledger(#[from] MediaStoreError),

    #[error("staging failed: {0}")]
    Stage(#[from] StageError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The delivery was cancelled (ack deadline or shutdown).
    #[error("processing cancelled")]
    Cancelled,
}

impl ProcessingError {
    /// Whether redelivering the same event could succeed.
    ///
    /// A malformed storage key is rejected the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::MediaNotFound(_)
                | Self::InvalidEvent(_)
                | Self::Stage(StageError::InvalidKey { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(!ProcessingError::MediaNotFound("m1".into()).is_retryable());
        assert!(!ProcessingError::InvalidEvent(EventBusError::InvalidEvent("x".into()))
            .is_retryable());
        assert!(ProcessingError::Cancelled.is_retryable());
        assert!(ProcessingError::Codec(CodecError::encode_failed("exit status: 1", "boom"))
            .is_retryable());
        assert!(ProcessingError::Ledger(MediaStoreError::Database("locked".into()))
            .is_retryable());
    }

    #[test]
    fn test_invalid_key_is_not_retryable() {
        let invalid = ProcessingError::Stage(StageError::InvalidKey {
            key: "original//m1/a.mov".into(),
            reason: "empty path segment".into(),
        });
        assert!(!invalid.is_retryable());

        let io = ProcessingError::Stage(StageError::Io(std::io::Error::other("disk full")));
        assert!(io.is_retryable());
    }

    #[test]
    fn test_codec_message_is_passed_through() {
        let err = ProcessingError::from(CodecError::encode_failed(
            "exit status: 1",
            "Unknown encoder 'libx265'",
        ));
        assert_eq!(
            err.to_string(),
            "ffmpeg transcoding failed (exit status: 1): Unknown encoder 'libx265'"
        );
    }
}
