use super::{types::Config, ConfigError};
use crate::stage::StorageBackend;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Worker pool has at least one worker, a non-empty queue and at least one delivery attempt
/// - The selected storage backend has what it needs
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.worker.workers == 0 {
        return Err(ConfigError::ValidationError(
            "worker.workers must be at least 1".to_string(),
        ));
    }

    if config.worker.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "worker.queue_capacity must be at least 1".to_string(),
        ));
    }

    if config.worker.max_delivery_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "worker.max_delivery_attempts must be at least 1".to_string(),
        ));
    }

    match config.storage.backend {
        StorageBackend::S3 if config.storage.bucket.trim().is_empty() => {
            return Err(ConfigError::ValidationError(
                "storage.bucket is required for the s3 backend".to_string(),
            ));
        }
        StorageBackend::Local if config.storage.local_root.as_os_str().is_empty() => {
            return Err(ConfigError::ValidationError(
                "storage.local_root is required for the local backend".to_string(),
            ));
        }
        _ => {}
    }

    Ok(())
}
