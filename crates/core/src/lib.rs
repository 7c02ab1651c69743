pub mod codec;
pub mod config;
pub mod events;
pub mod job;
pub mod media;
pub mod metrics;
pub mod processing;
pub mod stage;
pub mod status;
pub mod testing;

pub use codec::{Codec, CodecConfig, CodecError, FfmpegCodec, TranscodeOutput};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    LogFormat, LoggingConfig, SanitizedConfig, ServerConfig,
};
pub use events::{
    create_event_bus, Delivery, EventBusError, EventPublisher, EventSubscription,
    UploadConfirmedEvent,
};
pub use job::{JobStatus, JobStore, JobStoreError, ProcessingJob, SqliteJobStore};
pub use media::{
    ClaimOutcome, MediaItem, MediaStatus, MediaStore, MediaStoreError, NewMediaItem,
    SqliteMediaStore,
};
pub use processing::{
    HandleOutcome, MediaProcessor, ProcessingError, WorkerConfig, WorkerPool, WorkerPoolStatus,
};
pub use stage::{ObjectStage, StageError, StorageBackend, StorageConfig};
pub use status::{ProcessingStatus, StatusError, StatusService};
