//! Service status endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use faceswap_core::runner::PoolStatus;
use faceswap_core::OrchestratorStatus;

use crate::state::AppState;

/// Response for the status endpoint.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Jobs by stage and lifetime totals.
    pub orchestrator: OrchestratorStatus,
    /// Pipeline concurrency pool.
    pub pipeline: PoolStatus,
    /// True once every dependency is confirmed present.
    pub dependencies_ready: bool,
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let orchestrator = state.orchestrator();
    Json(StatusResponse {
        orchestrator: orchestrator.status(),
        pipeline: orchestrator.pipeline_status(),
        dependencies_ready: state.provisioner().snapshot().all_ready,
    })
}
