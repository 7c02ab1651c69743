use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EventBusError;

/// Published once the client has finished uploading the original file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfirmedEvent {
    pub media_id: String,
    /// `original/<owner_id>/<media_id>/<filename>`
    pub original_storage_key: String,
    pub owner_id: i64,
}

impl UploadConfirmedEvent {
    pub fn new(
        media_id: impl Into<String>,
        original_storage_key: impl Into<String>,
        owner_id: i64,
    ) -> Self {
        Self {
            media_id: media_id.into(),
            original_storage_key: original_storage_key.into(),
            owner_id,
        }
    }

    /// Reject events no handler could act on.
    pub fn validate(&self) -> Result<(), EventBusError> {
        if self.media_id.trim().is_empty() {
            return Err(EventBusError::InvalidEvent(
                "media_id must not be empty".to_string(),
            ));
        }
        if self.original_storage_key.trim().is_empty() {
            return Err(EventBusError::InvalidEvent(
                "original_storage_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One delivery of an event to a worker.
///
/// Redeliveries keep the message id and bump `attempt`.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: String,
    pub event: UploadConfirmedEvent,
    /// 1-based.
    pub attempt: u32,
    pub published_at: DateTime<Utc>,
}

impl Delivery {
    pub(crate) fn first(event: UploadConfirmedEvent) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            event,
            attempt: 1,
            published_at: Utc::now(),
        }
    }

    pub(crate) fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            published_at: Utc::now(),
            ..self
        }
    }
}
