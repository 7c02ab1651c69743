//! Drives one upload-confirmed event through claim, transcode and bookkeeping.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::{is_transcodable, Codec};
use crate::events::UploadConfirmedEvent;
use crate::job::{JobStatus, JobStore};
use crate::media::{ClaimOutcome, MediaStatus, MediaStore, MediaStoreError};
use crate::metrics;
use crate::stage::ObjectStage;

use super::ProcessingError;

/// What a successful `handle` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The item is now `ready`. `processed_key` is `None` for non-video inputs.
    Ready { processed_key: Option<String> },
    /// Another delivery already claimed or finished the item; nothing was done.
    AlreadyHandled { status: MediaStatus },
}

/// Handles upload-confirmed events.
///
/// Safe to run concurrently and repeatedly for the same event: the claim on
/// the media status column lets exactly one delivery do the work.
pub struct MediaProcessor {
    media: Arc<dyn MediaStore>,
    jobs: Arc<dyn JobStore>,
    stage: ObjectStage,
    codec: Arc<dyn Codec>,
}

impl MediaProcessor {
    pub fn new(
        media: Arc<dyn MediaStore>,
        jobs: Arc<dyn JobStore>,
        stage: ObjectStage,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            media,
            jobs,
            stage,
            codec,
        }
    }

    /// Process one event. An `Err` means the transport may redeliver it.
    pub async fn handle(
        &self,
        event: &UploadConfirmedEvent,
        cancel: &CancellationToken,
    ) -> Result<HandleOutcome, ProcessingError> {
        event.validate()?;
        let media_id = event.media_id.as_str();

        info!(
            media_id = %media_id,
            key = %event.original_storage_key,
            "Processing media"
        );

        match self.media.claim_for_processing(media_id) {
            Ok(ClaimOutcome::Claimed { previous }) => {
                debug!(media_id = %media_id, previous = %previous, "Claimed media for processing");
            }
            Ok(ClaimOutcome::AlreadyClaimed { current }) => {
                info!(
                    media_id = %media_id,
                    status = %current,
                    "Media already claimed or finished, acknowledging"
                );
                return Ok(HandleOutcome::AlreadyHandled { status: current });
            }
            Err(MediaStoreError::NotFound(_)) => {
                return Err(ProcessingError::MediaNotFound(media_id.to_string()));
            }
            Err(e) => {
                error!(media_id = %media_id, error = %e, "Failed to claim media");
                return Err(e.into());
            }
        }

        let job_id = match self.jobs.create(media_id, JobStatus::Processing) {
            Ok(job) => Some(job.id),
            Err(e) => {
                error!(media_id = %media_id, error = %e, "Failed to create processing job");
                None
            }
        };

        // Dropping the sequence removes the staging area and kills any child process.
        let result = tokio::select! {
            r = self.transcode(event, cancel) => r,
            _ = cancel.cancelled() => Err(ProcessingError::Cancelled),
        };

        let processed_key = match result {
            Ok(key) => key,
            Err(err) => {
                error!(media_id = %media_id, error = %err, "Transcoding failed");
                self.record_failure(media_id, job_id.as_deref(), &err);
                return Err(err);
            }
        };

        if let Err(e) = self.media.mark_ready(media_id, processed_key.as_deref()) {
            error!(media_id = %media_id, error = %e, "Failed to mark media ready");
            let err = ProcessingError::from(e);
            self.record_failure(media_id, job_id.as_deref(), &err);
            return Err(err);
        }

        if let Some(ref id) = job_id {
            if let Err(e) = self.jobs.complete(id) {
                warn!(job_id = %id, error = %e, "Failed to mark job completed");
            }
        }

        info!(
            media_id = %media_id,
            processed_key = processed_key.as_deref().unwrap_or(""),
            "Media processing completed"
        );

        Ok(HandleOutcome::Ready { processed_key })
    }

    /// Stage, encode, probe and upload. Returns the processed key, or `None`
    /// when the input is not a video.
    async fn transcode(
        &self,
        event: &UploadConfirmedEvent,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, ProcessingError> {
        let media_id = event.media_id.as_str();
        let key = event.original_storage_key.as_str();

        let area = self.stage.begin()?;
        let input = area.fetch(key).await?;

        if !is_transcodable(key) {
            info!(media_id = %media_id, key = %key, "File is not a video, skipping transcoding");
            metrics::TRANSCODES_TOTAL.with_label_values(&["skipped"]).inc();
            return Ok(None);
        }

        let output = area.output_path();
        let encoded = match self.codec.transcode(&input, &output, cancel).await {
            Ok(encoded) => {
                metrics::TRANSCODES_TOTAL.with_label_values(&["success"]).inc();
                encoded
            }
            Err(e) => {
                metrics::TRANSCODES_TOTAL.with_label_values(&["failed"]).inc();
                return Err(e.into());
            }
        };
        metrics::TRANSCODE_DURATION
            .with_label_values(&[])
            .observe(encoded.elapsed_ms as f64 / 1000.0);

        // Duration is best-effort metadata; zero means unknown and is not written.
        match self.codec.probe_duration(&output, cancel).await {
            Some(seconds) if seconds.trunc() > 0.0 => {
                if let Err(e) =
                    self.media
                        .record_metadata(media_id, Some(seconds.trunc() as i64), None)
                {
                    warn!(media_id = %media_id, error = %e, "Failed to record duration");
                }
            }
            Some(_) => {}
            None => metrics::PROBE_FAILURES_TOTAL.inc(),
        }

        let stored = area.store(&output, media_id).await?;

        if let Err(e) = self
            .media
            .record_metadata(media_id, None, Some(stored.size_bytes as i64))
        {
            warn!(media_id = %media_id, error = %e, "Failed to record processed size");
        }

        Ok(Some(stored.key))
    }

    /// Best-effort failure bookkeeping on both stores.
    fn record_failure(&self, media_id: &str, job_id: Option<&str>, err: &ProcessingError) {
        if let Err(e) = self.media.set_status(media_id, MediaStatus::Failed) {
            error!(media_id = %media_id, error = %e, "Failed to mark media failed");
        }
        if let Some(id) = job_id {
            if let Err(e) = self.jobs.fail(id, &err.to_string()) {
                warn!(job_id = %id, error = %e, "Failed to mark job failed");
            }
        }
    }
}
