//! Media status ledger: the user-visible status of each uploaded item.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteMediaStore;
pub use store::{MediaStore, MediaStoreError, NewMediaItem};
pub use types::{ClaimOutcome, MediaItem, MediaStatus};
