use thiserror::Error;

/// Errors from staging objects to and from local disk.
#[derive(Debug, Error)]
pub enum StageError {
    /// The object store rejected or failed the request.
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid storage configuration: {0}")]
    Config(String),
}

impl StageError {
    /// True when the object does not exist in the store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(object_store::Error::NotFound { .. }))
    }
}
