//! Job store: one record per processing attempt.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{JobStore, JobStoreError};
pub use types::{JobStatus, ProcessingJob};
