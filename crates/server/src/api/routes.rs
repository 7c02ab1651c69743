use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{events, handlers, middleware::metrics_middleware, processing};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Event ingress
        .route(
            "/events/upload-confirmed",
            post(events::publish_upload_confirmed),
        )
        // Processing status
        .route("/processing/workers", get(handlers::get_workers))
        .route("/processing/{media_id}/status", get(processing::get_status))
        .route("/processing/{media_id}/jobs", get(processing::list_jobs))
        .route_layer(middleware::from_fn(metrics_middleware))
        .with_state(Arc::clone(&state));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
