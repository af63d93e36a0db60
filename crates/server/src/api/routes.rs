use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, provision, status, swap};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Swap jobs
        .route("/swap", post(swap::swap_json))
        .route("/status", get(status::get_status))
        // Provisioning
        .route("/provision", get(provision::get_snapshot))
        .route("/provision", post(provision::recheck))
        .with_state(Arc::clone(&state));

    Router::new()
        .route("/", get(handlers::index))
        .route("/swap", post(swap::swap_form))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
