//! HTTP request handlers
//!
//! Implements REST API endpoints for the job lifecycle. Submission is the
//! only endpoint that rejects processing-related errors synchronously, and
//! only for spec validation, unsupported output formats, and a full queue;
//! decode and stage failures surface through status polling.

use crate::api::server::AppContext;
use crate::error::Error;
use crate::job::{JobSnapshot, SubmitRequest};
use crate::pipeline::{OutputRequest, PipelineSpec};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    /// Base64-encoded audio payload
    pub audio_base64: String,

    /// Optional content-type hint for the decoder probe
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Ordered stage invocations
    #[serde(default)]
    pub pipeline: PipelineSpec,

    /// Requested outputs; empty means one "default" WAV output
    #[serde(default)]
    pub outputs: Vec<OutputRequestBody>,

    /// Wall-clock budget in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct OutputRequestBody {
    pub name: String,
    pub format: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
    pub status: String,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "waveforge".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Job Endpoints
// ============================================================================

/// POST /jobs - Submit a new processing job
///
/// Returns 202 with the job id on admission. Validation failures are 400,
/// a full queue is 429; neither creates a job.
pub async fn submit_job(
    State(ctx): State<AppContext>,
    Json(req): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<SubmitJobResponse>), (StatusCode, Json<StatusResponse>)> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.audio_base64)
        .map_err(|e| {
            warn!("Rejected submission with invalid base64 payload: {}", e);
            error_response(
                StatusCode::BAD_REQUEST,
                format!("invalid base64 payload: {}", e),
            )
        })?;

    let submit = SubmitRequest {
        bytes,
        mime_type: req.mime_type,
        spec: req.pipeline,
        outputs: req
            .outputs
            .into_iter()
            .map(|o| OutputRequest::new(o.name, o.format))
            .collect(),
        timeout: req.timeout_ms.map(Duration::from_millis),
    };

    match ctx.coordinator.submit(submit) {
        Ok(job_id) => {
            info!("Accepted job {}", job_id);
            Ok((
                StatusCode::ACCEPTED,
                Json(SubmitJobResponse {
                    job_id,
                    status: "queued".to_string(),
                }),
            ))
        }
        Err(e) => {
            warn!("Rejected submission: {}", e);
            Err(error_response(submit_error_status(&e), e.to_string()))
        }
    }
}

/// GET /jobs/:job_id - Poll job status
pub async fn job_status(
    State(ctx): State<AppContext>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, (StatusCode, Json<StatusResponse>)> {
    match ctx.coordinator.status(job_id) {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => Err(error_response(StatusCode::NOT_FOUND, e.to_string())),
    }
}

/// POST /jobs/:job_id/cancel - Request cancellation
///
/// Cancelling a job that already reached a terminal state is not an error;
/// the response reports that nothing changed.
pub async fn cancel_job(
    State(ctx): State<AppContext>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, (StatusCode, Json<StatusResponse>)> {
    match ctx.coordinator.cancel(job_id) {
        Ok(()) => Ok(Json(StatusResponse {
            status: "cancelling".to_string(),
        })),
        Err(Error::AlreadyTerminal(_)) => Ok(Json(StatusResponse {
            status: "already_terminal".to_string(),
        })),
        Err(e) => Err(error_response(StatusCode::NOT_FOUND, e.to_string())),
    }
}

/// GET /jobs/:job_id/artifacts/:name - Download one encoded output
pub async fn job_artifact(
    State(ctx): State<AppContext>,
    Path((job_id, name)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, (StatusCode, Json<StatusResponse>)> {
    match ctx.coordinator.artifact(job_id, &name) {
        Ok(artifact) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, artifact.content_type)],
            artifact.bytes,
        )),
        Err(e) => Err(error_response(StatusCode::NOT_FOUND, e.to_string())),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn submit_error_status(e: &Error) -> StatusCode {
    match e {
        Error::Validation { .. } | Error::Encode(_) => StatusCode::BAD_REQUEST,
        Error::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(code: StatusCode, message: String) -> (StatusCode, Json<StatusResponse>) {
    (
        code,
        Json(StatusResponse {
            status: format!("error: {}", message),
        }),
    )
}
