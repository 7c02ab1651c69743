//! Media status ledger trait and request types.

use thiserror::Error;

use super::{ClaimOutcome, MediaItem, MediaStatus};

/// Error type for media ledger operations.
#[derive(Debug, Error)]
pub enum MediaStoreError {
    /// Media item not found.
    #[error("media not found: {0}")]
    NotFound(String),
    /// A media item with this id already exists.
    #[error("media already exists: {0}")]
    AlreadyExists(String),
    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Request to register a media item.
///
/// Media rows are created by the upload collaborator; the pipeline only uses
/// this for bootstrapping and tests.
#[derive(Debug, Clone)]
pub struct NewMediaItem {
    pub id: String,
    pub owner_id: i64,
    pub original_storage_key: String,
    pub size_bytes: i64,
    pub status: MediaStatus,
}

impl NewMediaItem {
    /// A freshly confirmed upload waiting for its event to be consumed.
    pub fn queued(id: impl Into<String>, owner_id: i64, original_storage_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id,
            original_storage_key: original_storage_key.into(),
            size_bytes: 0,
            status: MediaStatus::Queued,
        }
    }
}

/// Storage backend for the user-visible media status.
///
/// Every update touches a single row and is durable when the call returns.
/// Rows are never deleted by the pipeline.
pub trait MediaStore: Send + Sync {
    /// Register a media item.
    fn insert(&self, item: NewMediaItem) -> Result<MediaItem, MediaStoreError>;

    /// Get a media item by id.
    fn get(&self, id: &str) -> Result<Option<MediaItem>, MediaStoreError>;

    /// Unconditionally set the status column.
    fn set_status(&self, id: &str, status: MediaStatus) -> Result<(), MediaStoreError>;

    /// Atomically move the item to `processing` if its current status is claimable.
    ///
    /// This is a compare-and-swap on the status column: two concurrent callers for
    /// the same id can never both observe `Claimed`.
    fn claim_for_processing(&self, id: &str) -> Result<ClaimOutcome, MediaStoreError>;

    /// Mark the item ready, setting the processed key when one was produced.
    /// `None` leaves the processed key untouched.
    fn mark_ready(&self, id: &str, processed_key: Option<&str>) -> Result<(), MediaStoreError>;

    /// Record probed duration and artifact size. `None` leaves a column untouched.
    fn record_metadata(
        &self,
        id: &str,
        duration_seconds: Option<i64>,
        size_bytes: Option<i64>,
    ) -> Result<(), MediaStoreError>;
}
