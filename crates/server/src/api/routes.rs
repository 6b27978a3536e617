use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{batch, handlers, jobs, middleware as api_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health, config, metrics
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Batch runs
        .route("/batch", post(batch::trigger_batch))
        .route("/batch/status", get(batch::batch_status))
        .route("/batch/cancel", post(batch::cancel_batch))
        // Single conversions
        .route("/convert", post(jobs::trigger_convert))
        .route("/jobs/{id}", get(jobs::get_job))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_middleware::auth_middleware,
        ))
        .layer(middleware::from_fn(api_middleware::metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
