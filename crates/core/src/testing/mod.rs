//! Testing utilities: a mock codec and fixtures for wiring the pipeline
//! without ffmpeg or a real bucket.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediavault_core::testing::{fixtures, MockCodec};
//!
//! let codec = MockCodec::new();
//! codec.fail_next(1, "Unknown encoder 'libx265'");
//!
//! let store = fixtures::memory_store();
//! fixtures::seed_object(&store, "original/7/m1/clip.mov", b"...").await;
//! ```

mod mock_codec;

pub use mock_codec::MockCodec;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use object_store::{GetOptions, ObjectStore, PutOptions, PutPayload};

    use crate::events::UploadConfirmedEvent;
    use crate::media::NewMediaItem;

    /// `original/<owner_id>/<media_id>/<filename>`
    pub fn original_key(owner_id: i64, media_id: &str, filename: &str) -> String {
        format!("original/{}/{}/{}", owner_id, media_id, filename)
    }

    /// A queued media row for an uploaded file.
    pub fn queued_media(owner_id: i64, media_id: &str, filename: &str) -> NewMediaItem {
        NewMediaItem::queued(media_id, owner_id, original_key(owner_id, media_id, filename))
    }

    /// The event the upload collaborator publishes for the same file.
    pub fn upload_event(owner_id: i64, media_id: &str, filename: &str) -> UploadConfirmedEvent {
        UploadConfirmedEvent::new(media_id, original_key(owner_id, media_id, filename), owner_id)
    }

    pub fn memory_store() -> Arc<dyn ObjectStore> {
        Arc::new(InMemory::new())
    }

    /// Put `data` at `key`, panicking on failure.
    pub async fn seed_object(store: &Arc<dyn ObjectStore>, key: &str, data: &[u8]) {
        store
            .put_opts(
                &ObjectPath::parse(key).expect("valid key"),
                PutPayload::from(data.to_vec()),
                PutOptions::default(),
            )
            .await
            .expect("seed object");
    }

    /// Whether an object exists at `key`.
    pub async fn object_exists(store: &Arc<dyn ObjectStore>, key: &str) -> bool {
        match ObjectPath::parse(key) {
            Ok(path) => store.get_opts(&path, GetOptions::default()).await.is_ok(),
            Err(_) => false,
        }
    }
}
