//! Read path for processing status. Never writes to either store.

mod service;

pub use service::{ProcessingStatus, StatusService};

use thiserror::Error;

use crate::job::JobStoreError;
use crate::media::MediaStoreError;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("media not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Media(#[from] MediaStoreError),

    #[error(transparent)]
    Jobs(#[from] JobStoreError),
}
