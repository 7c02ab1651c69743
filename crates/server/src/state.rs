use std::sync::Arc;

use mediavault_core::{
    Config, EventPublisher, SanitizedConfig, StatusService, WorkerPool, WorkerPoolStatus,
};

/// Shared application state
pub struct AppState {
    config: Config,
    publisher: EventPublisher,
    status: StatusService,
    pool: Arc<WorkerPool>,
}

impl AppState {
    pub fn new(
        config: Config,
        publisher: EventPublisher,
        status: StatusService,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            config,
            publisher,
            status,
            pool,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn status(&self) -> &StatusService {
        &self.status
    }

    pub fn pool_status(&self) -> WorkerPoolStatus {
        self.pool.status()
    }
}
