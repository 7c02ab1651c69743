use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use super::StatusError;
use crate::job::{JobStore, ProcessingJob};
use crate::media::MediaStore;

/// Current processing status of one media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingStatus {
    pub media_id: String,
    /// Job status when a job exists, otherwise the media status.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Answers status queries from the job store and the media ledger.
pub struct StatusService {
    media: Arc<dyn MediaStore>,
    jobs: Arc<dyn JobStore>,
}

impl StatusService {
    pub fn new(media: Arc<dyn MediaStore>, jobs: Arc<dyn JobStore>) -> Self {
        Self { media, jobs }
    }

    /// The most recent job wins; without one, the media row's status is reported.
    pub fn get_status(&self, media_id: &str) -> Result<ProcessingStatus, StatusError> {
        match self.jobs.latest_for_media(media_id) {
            Ok(Some(job)) => {
                return Ok(ProcessingStatus {
                    media_id: media_id.to_string(),
                    status: job.status.to_string(),
                    error_message: job.error_message,
                })
            }
            Ok(None) => {}
            Err(e) => {
                warn!(media_id = %media_id, error = %e, "Job lookup failed, falling back to media status");
            }
        }

        match self.media.get(media_id)? {
            Some(item) => Ok(ProcessingStatus {
                media_id: media_id.to_string(),
                status: item.status.to_string(),
                error_message: None,
            }),
            None => Err(StatusError::NotFound(media_id.to_string())),
        }
    }

    /// Every processing attempt for the item, newest first.
    pub fn list_jobs(&self, media_id: &str) -> Result<Vec<ProcessingJob>, StatusError> {
        let jobs = self.jobs.list_for_media(media_id)?;
        if jobs.is_empty() && self.media.get(media_id)?.is_none() {
            return Err(StatusError::NotFound(media_id.to_string()));
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobStatus, JobStoreError, SqliteJobStore};
    use crate::media::{MediaStatus, NewMediaItem, SqliteMediaStore};

    fn service() -> (StatusService, Arc<SqliteMediaStore>, Arc<SqliteJobStore>) {
        let media = Arc::new(SqliteMediaStore::in_memory().unwrap());
        let jobs = Arc::new(SqliteJobStore::in_memory().unwrap());
        (StatusService::new(media.clone(), jobs.clone()), media, jobs)
    }

    #[test]
    fn test_queued_without_job() {
        let (svc, media, _) = service();
        media
            .insert(NewMediaItem::queued("m1", 7, "original/7/m1/clip.mov"))
            .unwrap();

        let status = svc.get_status("m1").unwrap();
        assert_eq!(status.status, "queued");
        assert_eq!(status.error_message, None);
    }

    #[test]
    fn test_latest_job_wins() {
        let (svc, media, jobs) = service();
        media
            .insert(NewMediaItem::queued("m1", 7, "original/7/m1/clip.mov"))
            .unwrap();
        let first = jobs.create("m1", JobStatus::Processing).unwrap();
        jobs.fail(&first.id, "ffmpeg transcoding failed").unwrap();
        let second = jobs.create("m1", JobStatus::Processing).unwrap();

        let status = svc.get_status("m1").unwrap();
        assert_eq!(status.status, "processing");
        assert_eq!(status.error_message, None);

        jobs.fail(&second.id, "disk full").unwrap();
        let status = svc.get_status("m1").unwrap();
        assert_eq!(status.status, "failed");
        assert_eq!(status.error_message.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_job_without_media_row() {
        let (svc, _, jobs) = service();
        jobs.create("orphan", JobStatus::Pending).unwrap();

        assert_eq!(svc.get_status("orphan").unwrap().status, "pending");
    }

    #[test]
    fn test_unknown_id() {
        let (svc, _, _) = service();
        assert!(matches!(svc.get_status("nope"), Err(StatusError::NotFound(_))));
        assert!(matches!(svc.list_jobs("nope"), Err(StatusError::NotFound(_))));
    }

    #[test]
    fn test_does_not_mutate() {
        let (svc, media, _) = service();
        media
            .insert(NewMediaItem::queued("m1", 7, "original/7/m1/clip.mov"))
            .unwrap();

        svc.get_status("m1").unwrap();
        svc.list_jobs("m1").unwrap();

        assert_eq!(media.get("m1").unwrap().unwrap().status, MediaStatus::Queued);
    }

    struct BrokenJobs;

    impl JobStore for BrokenJobs {
        fn create(&self, _: &str, _: JobStatus) -> Result<ProcessingJob, JobStoreError> {
            Err(JobStoreError::Database("down".into()))
        }
        fn get(&self, _: &str) -> Result<Option<ProcessingJob>, JobStoreError> {
            Err(JobStoreError::Database("down".into()))
        }
        fn latest_for_media(&self, _: &str) -> Result<Option<ProcessingJob>, JobStoreError> {
            Err(JobStoreError::Database("down".into()))
        }
        fn list_for_media(&self, _: &str) -> Result<Vec<ProcessingJob>, JobStoreError> {
            Err(JobStoreError::Database("down".into()))
        }
        fn complete(&self, _: &str) -> Result<(), JobStoreError> {
            Err(JobStoreError::Database("down".into()))
        }
        fn fail(&self, _: &str, _: &str) -> Result<(), JobStoreError> {
            Err(JobStoreError::Database("down".into()))
        }
    }

    #[test]
    fn test_falls_back_to_media_when_jobs_unavailable() {
        let media = Arc::new(SqliteMediaStore::in_memory().unwrap());
        media
            .insert(NewMediaItem::queued("m1", 7, "original/7/m1/clip.mov"))
            .unwrap();
        let svc = StatusService::new(media, Arc::new(BrokenJobs));

        assert_eq!(svc.get_status("m1").unwrap().status, "queued");
        assert!(matches!(svc.list_jobs("m1"), Err(StatusError::Jobs(_))));
    }
}
