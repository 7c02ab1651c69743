//! Processing status API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use mediavault_core::{JobStatus, ProcessingJob, ProcessingStatus, StatusError};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// One processing attempt
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub media_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

impl From<ProcessingJob> for JobResponse {
    fn from(job: ProcessingJob) -> Self {
        Self {
            id: job.id,
            media_id: job.media_id,
            status: job.status,
            error_message: job.error_message,
            started_at: job.started_at.map(|t| t.to_rfc3339()),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
            created_at: job.created_at.to_rfc3339(),
        }
    }
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub media_id: String,
    pub jobs: Vec<JobResponse>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ProcessingErrorResponse {
    pub error: String,
}

fn error_response(media_id: &str, e: StatusError) -> (StatusCode, Json<ProcessingErrorResponse>) {
    match e {
        StatusError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(ProcessingErrorResponse {
                error: "media not found".to_string(),
            }),
        ),
        other => {
            error!(media_id = %media_id, error = %other, "Status query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProcessingErrorResponse {
                    error: other.to_string(),
                }),
            )
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Current processing status of a media item
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<String>,
) -> Result<Json<ProcessingStatus>, impl IntoResponse> {
    state
        .status()
        .get_status(&media_id)
        .map(Json)
        .map_err(|e| error_response(&media_id, e))
}

/// Processing attempts for a media item, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<String>,
) -> Result<Json<ListJobsResponse>, impl IntoResponse> {
    match state.status().list_jobs(&media_id) {
        Ok(jobs) => Ok(Json(ListJobsResponse {
            media_id,
            jobs: jobs.into_iter().map(JobResponse::from).collect(),
        })),
        Err(e) => Err(error_response(&media_id, e)),
    }
}
