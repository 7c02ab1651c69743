//! Common test utilities for in-process API testing.
//!
//! This module provides a test fixture that builds the full application
//! (stores, object stage, event bus, worker pool, router) with a mock codec
//! and an in-memory bucket, so requests exercise the real pipeline without
//! ffmpeg or network storage.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use object_store::ObjectStore;
use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use mediavault_core::{
    create_event_bus, Config, DatabaseConfig, MediaProcessor, MediaStore, ObjectStage,
    SqliteJobStore, SqliteMediaStore, StatusService, StorageBackend, WorkerConfig, WorkerPool,
    testing::MockCodec,
};
use mediavault_server::state::AppState;

/// Re-export fixtures for test convenience
pub use mediavault_core::testing::fixtures;

/// Test fixture for API testing with a mock codec.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_status() {
///     let fixture = TestFixture::new().await;
///     fixture.upload(7, "m1", "clip.mov").await;
///
///     let response = fixture.get("/api/v1/processing/m1/status").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock codec - control encoder outcomes
    pub codec: Arc<MockCodec>,
    /// Media ledger, for seeding items the upload collaborator would create
    pub media: Arc<SqliteMediaStore>,
    /// In-memory bucket
    pub store: Arc<dyn ObjectStore>,
    /// Worker pool driving the pipeline
    pub pool: Arc<WorkerPool>,
    shutdown: CancellationToken,
    /// Temporary directory for the test database and scratch space
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::with_queue_capacity(16).await
    }

    pub async fn with_queue_capacity(queue_capacity: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            worker: WorkerConfig {
                workers: 2,
                queue_capacity,
                redelivery_backoff_base_ms: 10,
                redelivery_backoff_max_ms: 50,
                ..Default::default()
            },
            ..Default::default()
        };

        let media = Arc::new(SqliteMediaStore::new(&db_path).expect("Failed to create media store"));
        let jobs = Arc::new(SqliteJobStore::new(&db_path).expect("Failed to create job store"));
        let store = fixtures::memory_store();
        let codec = Arc::new(MockCodec::new());

        let stage = ObjectStage::new(Arc::clone(&store), StorageBackend::Memory)
            .with_scratch_root(temp_dir.path().join("scratch"));
        let processor = Arc::new(MediaProcessor::new(
            media.clone(),
            jobs.clone(),
            stage,
            codec.clone(),
        ));

        let shutdown = CancellationToken::new();
        let (publisher, subscription) = create_event_bus(config.worker.queue_capacity);
        let pool = Arc::new(WorkerPool::spawn(
            processor,
            subscription,
            config.worker.clone(),
            shutdown.clone(),
        ));

        let state = Arc::new(AppState::new(
            config,
            publisher,
            StatusService::new(media.clone(), jobs),
            Arc::clone(&pool),
        ));
        let router = mediavault_server::api::create_router(state);

        Self {
            router,
            codec,
            media,
            store,
            pool,
            shutdown,
            temp_dir,
        }
    }

    /// Register a queued item and upload its original to the bucket.
    pub async fn upload(&self, owner_id: i64, media_id: &str, filename: &str) {
        self.media
            .insert(fixtures::queued_media(owner_id, media_id, filename))
            .expect("Failed to insert media");
        fixtures::seed_object(
            &self.store,
            &fixtures::original_key(owner_id, media_id, filename),
            b"original upload bytes",
        )
        .await;
    }

    /// Poll the status endpoint until it reports `expected`.
    pub async fn wait_for_status(&self, media_id: &str, expected: &str) -> TestResponse {
        let path = format!("/api/v1/processing/{}/status", media_id);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let response = self.get(&path).await;
            if response.body["status"] == expected {
                return response;
            }
            if tokio::time::Instant::now() > deadline {
                panic!(
                    "status of {} never became {}, last: {}",
                    media_id, expected, response.body
                );
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }

    /// Stop the workers and wait for them to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.pool.join().await;
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
