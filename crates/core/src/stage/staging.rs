//! Scoped staging of objects on local disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, Attributes, GetOptions, ObjectStore, PutOptions, PutPayload,
};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use super::{StageError, StorageBackend, StorageConfig};

/// Namespace for transcoded artifacts.
pub const PROCESSED_PREFIX: &str = "processed";

/// Container extension of every transcoded artifact.
pub const PROCESSED_EXTENSION: &str = "mp4";

/// Content type stamped on transcoded artifacts.
pub const PROCESSED_CONTENT_TYPE: &str = "video/mp4";

const SCRATCH_PREFIX: &str = "media-processing-";

/// Deterministic key for the processed artifact of a media item.
pub fn processed_key(media_id: &str) -> String {
    format!("{}/{}.{}", PROCESSED_PREFIX, media_id, PROCESSED_EXTENSION)
}

/// Build the object store selected by the configuration.
pub fn create_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StageError> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(InMemory::new())),
        StorageBackend::Local => {
            std::fs::create_dir_all(&config.local_root)?;
            let store = LocalFileSystem::new_with_prefix(&config.local_root)
                .map_err(|e| StageError::Config(e.to_string()))?;
            Ok(Arc::new(store))
        }
        StorageBackend::S3 => {
            let mut builder = AmazonS3Builder::from_env()
                .with_region(config.region.clone())
                .with_bucket_name(config.bucket.clone());

            if let Some(ref endpoint) = config.endpoint {
                let allow_http = config.allow_http || endpoint.starts_with("http://");
                builder = builder
                    .with_endpoint(endpoint.clone())
                    .with_allow_http(allow_http);
            }
            if let Some(ref key) = config.access_key {
                builder = builder.with_access_key_id(key.clone());
            }
            if let Some(ref secret) = config.secret_key {
                builder = builder.with_secret_access_key(secret.clone());
            }

            let store = builder
                .build()
                .map_err(|e| StageError::Config(e.to_string()))?;
            Ok(Arc::new(store))
        }
    }
}

fn parse_key(key: &str) -> Result<ObjectPath, StageError> {
    ObjectPath::parse(key).map_err(|e| StageError::InvalidKey {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Moves objects between the media bucket and per-job scratch directories.
#[derive(Clone)]
pub struct ObjectStage {
    store: Arc<dyn ObjectStore>,
    backend: StorageBackend,
    scratch_root: Option<PathBuf>,
}

impl ObjectStage {
    pub fn new(store: Arc<dyn ObjectStore>, backend: StorageBackend) -> Self {
        Self {
            store,
            backend,
            scratch_root: None,
        }
    }

    /// Build the store from configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StageError> {
        Ok(Self::new(create_object_store(config)?, config.backend))
    }

    /// Create scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn backend(&self) -> StorageBackend {
        self.backend
    }

    /// Open a fresh scratch directory for one job.
    ///
    /// The directory and everything in it is removed when the returned
    /// [`StagingArea`] is dropped, whichever way the job ends.
    pub fn begin(&self) -> Result<StagingArea, StageError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX);

        let dir = match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        debug!(path = %dir.path().display(), "Opened staging area");

        Ok(StagingArea {
            dir,
            store: Arc::clone(&self.store),
            attributes_supported: self.backend.supports_attributes(),
        })
    }
}

/// A processed artifact that has been uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub key: String,
    pub size_bytes: u64,
}

/// Private scratch directory for a single job.
pub struct StagingArea {
    dir: TempDir,
    store: Arc<dyn ObjectStore>,
    attributes_supported: bool,
}

impl StagingArea {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the encoder should write its output.
    pub fn output_path(&self) -> PathBuf {
        self.dir
            .path()
            .join(format!("output.{}", PROCESSED_EXTENSION))
    }

    /// Download `key` into the scratch directory as `input<ext>`, keeping the
    /// extension of the original key.
    pub async fn fetch(&self, key: &str) -> Result<PathBuf, StageError> {
        let location = parse_key(key)?;
        let file_name = match Path::new(key).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("input.{}", ext),
            None => "input".to_string(),
        };
        let local_path = self.dir.path().join(file_name);
        let start = Instant::now();

        let result = self
            .store
            .get_opts(&location, GetOptions::default())
            .await
            .inspect_err(|e| {
                error!(
                    error = %e,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object download failed"
                );
            })?;

        let mut file = tokio::fs::File::create(&local_path).await?;
        let mut stream = result.into_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!(
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Staged object"
        );

        Ok(local_path)
    }

    /// Upload a local file as the processed artifact for `media_id`.
    pub async fn store(
        &self,
        local_path: &Path,
        media_id: &str,
    ) -> Result<StoredArtifact, StageError> {
        let key = processed_key(media_id);
        let location = parse_key(&key)?;
        let data = tokio::fs::read(local_path).await?;
        let size_bytes = data.len() as u64;
        let start = Instant::now();

        let mut opts = PutOptions::default();
        if self.attributes_supported {
            opts.attributes = Attributes::from_iter([(
                Attribute::ContentType,
                PROCESSED_CONTENT_TYPE,
            )]);
        }

        self.store
            .put_opts(&location, PutPayload::from(data), opts)
            .await
            .inspect_err(|e| {
                error!(
                    error = %e,
                    key = %key,
                    size_bytes,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Artifact upload failed"
                );
            })?;

        info!(
            key = %key,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Uploaded processed artifact"
        );

        Ok(StoredArtifact { key, size_bytes })
    }
}
