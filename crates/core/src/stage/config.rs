//! Object store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which object store implementation backs the media bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local, lost on restart. Tests and demos.
    Memory,
    /// A directory on the local filesystem.
    #[default]
    Local,
    /// S3 or an S3-compatible service such as MinIO.
    S3,
}

impl StorageBackend {
    /// Whether `put` can carry object attributes such as the content type.
    ///
    /// The local filesystem store rejects attributes with `NotImplemented`.
    pub fn supports_attributes(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

/// Configuration for the media bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the `local` backend.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible services, e.g. `http://localhost:9000`.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Falls back to the standard AWS environment variables when unset.
    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Allow plain HTTP even when the endpoint is not an `http://` URL.
    #[serde(default)]
    pub allow_http: bool,
}

fn default_local_root() -> PathBuf {
    PathBuf::from("media-vault-data")
}

fn default_bucket() -> String {
    "media-vault".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_root: default_local_root(),
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            allow_http: false,
        }
    }
}

impl StorageConfig {
    /// In-memory storage, mostly for tests.
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            ..Default::default()
        }
    }

    /// Local filesystem storage rooted at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Local,
            local_root: root.into(),
            ..Default::default()
        }
    }
}
