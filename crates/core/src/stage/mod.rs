//! Object stage: moves media between the bucket and per-job scratch space.

mod config;
mod error;
mod staging;

pub use config::{StorageBackend, StorageConfig};
pub use error::StageError;
pub use staging::{
    create_object_store, processed_key, ObjectStage, StagingArea, StoredArtifact,
    PROCESSED_CONTENT_TYPE, PROCESSED_EXTENSION, PROCESSED_PREFIX,
};
