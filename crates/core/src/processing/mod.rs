//! Event handling: the media processor and the worker pool that feeds it.

mod config;
mod error;
mod pool;
mod processor;

pub use config::WorkerConfig;
pub use error::ProcessingError;
pub use pool::{WorkerPool, WorkerPoolStatus};
pub use processor::{HandleOutcome, MediaProcessor};
