//! Event ingress: the upload collaborator hands confirmed uploads to the pipeline here.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use mediavault_core::{EventBusError, UploadConfirmedEvent};

use crate::metrics::EVENTS_RECEIVED_TOTAL;
use crate::state::AppState;

/// Response for an accepted event
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub message_id: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct EventErrorResponse {
    pub error: String,
}

/// Queue an upload-confirmed event for processing
pub async fn publish_upload_confirmed(
    State(state): State<Arc<AppState>>,
    Json(event): Json<UploadConfirmedEvent>,
) -> Result<(StatusCode, Json<PublishResponse>), impl IntoResponse> {
    let media_id = event.media_id.clone();

    match state.publisher().try_publish(event) {
        Ok(message_id) => {
            EVENTS_RECEIVED_TOTAL.with_label_values(&["accepted"]).inc();
            info!(media_id = %media_id, message_id = %message_id, "Accepted upload-confirmed event");
            Ok((StatusCode::ACCEPTED, Json(PublishResponse { message_id })))
        }
        Err(e) => {
            let (status, result) = match e {
                EventBusError::InvalidEvent(_) => (StatusCode::BAD_REQUEST, "invalid"),
                EventBusError::QueueFull => (StatusCode::SERVICE_UNAVAILABLE, "queue_full"),
                EventBusError::Closed => (StatusCode::SERVICE_UNAVAILABLE, "closed"),
            };
            EVENTS_RECEIVED_TOTAL.with_label_values(&[result]).inc();
            warn!(media_id = %media_id, error = %e, "Rejected upload-confirmed event");
            Err((
                status,
                Json(EventErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
