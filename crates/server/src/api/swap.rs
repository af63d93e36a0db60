//! Swap job endpoints.
//!
//! `POST /swap` takes form fields, `POST /api/v1/swap` takes JSON; both run
//! the job to completion and answer with the same body.

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        State,
    },
    http::StatusCode,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use faceswap_core::{SwapError, SwapErrorKind, SwapOutcome, SwapRequest};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a swap job
#[derive(Debug, Deserialize)]
pub struct SwapBody {
    /// Share link to the source face image
    pub source_url: String,
    /// Share link to the target video
    pub target_url: String,
}

/// Response body for a swap job
#[derive(Debug, Serialize)]
pub struct SwapResponse {
    /// "success" or "error"
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<SwapErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl From<SwapOutcome> for SwapResponse {
    fn from(outcome: SwapOutcome) -> Self {
        Self {
            status: "success",
            message: "Face swap completed".to_string(),
            output_path: Some(outcome.output_path.display().to_string()),
            error_kind: None,
            job_id: Some(outcome.job_id.to_string()),
        }
    }
}

impl From<&SwapError> for SwapResponse {
    fn from(err: &SwapError) -> Self {
        Self {
            status: "error",
            message: err.message.clone(),
            output_path: None,
            error_kind: Some(err.kind),
            job_id: Some(err.job_id.to_string()),
        }
    }
}

impl SwapResponse {
    /// A body that could not be read as a swap request. No job is created.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            output_path: None,
            error_kind: Some(SwapErrorKind::InvalidReference),
            job_id: None,
        }
    }
}

/// HTTP status for a failure class.
pub fn status_for(kind: SwapErrorKind) -> StatusCode {
    match kind {
        SwapErrorKind::InvalidReference => StatusCode::BAD_REQUEST,
        SwapErrorKind::FetchFailed => StatusCode::BAD_GATEWAY,
        SwapErrorKind::ProvisionFailed => StatusCode::SERVICE_UNAVAILABLE,
        SwapErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        SwapErrorKind::SpawnError | SwapErrorKind::PipelineError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /swap - form-encoded submission
pub async fn swap_form(
    State(state): State<Arc<AppState>>,
    body: Result<Form<SwapBody>, FormRejection>,
) -> (StatusCode, Json<SwapResponse>) {
    match body {
        Ok(Form(body)) => run_swap(&state, body).await,
        Err(rejection) => reject(rejection.body_text()),
    }
}

/// POST /api/v1/swap - JSON submission
pub async fn swap_json(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SwapBody>, JsonRejection>,
) -> (StatusCode, Json<SwapResponse>) {
    match body {
        Ok(Json(body)) => run_swap(&state, body).await,
        Err(rejection) => reject(rejection.body_text()),
    }
}

fn reject(message: String) -> (StatusCode, Json<SwapResponse>) {
    warn!(error = %message, "Swap request body rejected");
    (
        StatusCode::BAD_REQUEST,
        Json(SwapResponse::rejected(message)),
    )
}

async fn run_swap(state: &AppState, body: SwapBody) -> (StatusCode, Json<SwapResponse>) {
    let request = SwapRequest::new(body.source_url, body.target_url);

    match state.orchestrator().submit(request).await {
        Ok(outcome) => {
            info!(
                job_id = %outcome.job_id,
                output = %outcome.output_path.display(),
                elapsed_ms = outcome.elapsed_ms,
                "Swap request succeeded"
            );
            (StatusCode::OK, Json(SwapResponse::from(outcome)))
        }
        Err(err) => {
            if err.kind.is_service_level() {
                error!(job_id = %err.job_id, kind = %err.kind, error = %err, "Swap request failed");
            } else {
                warn!(job_id = %err.job_id, kind = %err.kind, error = %err, "Swap request failed");
            }
            (status_for(err.kind), Json(SwapResponse::from(&err)))
        }
    }
}
