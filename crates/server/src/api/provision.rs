//! Provisioning API handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use faceswap_core::provisioner::Readiness;
use faceswap_core::ProvisionSnapshot;

use crate::state::AppState;

/// Outcome of a recheck.
#[derive(Debug, Serialize)]
pub struct RecheckResponse {
    pub success: bool,
    /// Dependencies ensured before the first failure, in order.
    pub ensured: Vec<EnsuredDependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Status after the recheck.
    pub snapshot: ProvisionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct EnsuredDependency {
    pub name: String,
    pub readiness: Readiness,
}

/// GET /api/v1/provision - current dependency status
pub async fn get_snapshot(State(state): State<Arc<AppState>>) -> Json<ProvisionSnapshot> {
    Json(state.provisioner().snapshot())
}

/// POST /api/v1/provision - forget cached results and ensure everything again
pub async fn recheck(State(state): State<Arc<AppState>>) -> (StatusCode, Json<RecheckResponse>) {
    let provisioner = state.provisioner();
    info!("Provisioning recheck requested");

    let (status, ensured, error) = match provisioner.recheck_all().await {
        Ok(outcomes) => (StatusCode::OK, outcomes, None),
        Err(e) => {
            error!(error = %e, "Provisioning recheck failed");
            (StatusCode::SERVICE_UNAVAILABLE, Vec::new(), Some(e.to_string()))
        }
    };

    let snapshot = provisioner.snapshot();
    let ensured = ensured
        .into_iter()
        .map(|(name, readiness)| EnsuredDependency { name, readiness })
        .collect();

    (
        status,
        Json(RecheckResponse {
            success: error.is_none(),
            ensured,
            error,
            snapshot,
        }),
    )
}
