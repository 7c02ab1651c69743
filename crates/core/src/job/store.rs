use thiserror::Error;

use super::{JobStatus, ProcessingJob};

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {job_id} is already {current}")]
    InvalidState { job_id: String, current: JobStatus },

    #[error("database error: {0}")]
    Database(String),
}

/// Append-only record of processing attempts.
pub trait JobStore: Send + Sync {
    /// Record a new attempt. `started_at` is set when the job starts out as `processing`.
    fn create(&self, media_id: &str, status: JobStatus) -> Result<ProcessingJob, JobStoreError>;

    fn get(&self, id: &str) -> Result<Option<ProcessingJob>, JobStoreError>;

    /// Most recently created job for a media item.
    fn latest_for_media(&self, media_id: &str) -> Result<Option<ProcessingJob>, JobStoreError>;

    /// All jobs for a media item, newest first.
    fn list_for_media(&self, media_id: &str) -> Result<Vec<ProcessingJob>, JobStoreError>;

    /// Move a pending or processing job to `completed`.
    fn complete(&self, id: &str) -> Result<(), JobStoreError>;

    /// Move a pending or processing job to `failed` with a reason.
    fn fail(&self, id: &str, error_message: &str) -> Result<(), JobStoreError>;
}
