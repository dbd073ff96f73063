pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/candidates/analyze", post(handlers::handle_analyze))
        .route(
            "/api/v1/candidates/analyze-batch",
            post(handlers::handle_analyze_batch),
        )
        .route(
            "/api/v1/candidates/analyze-text",
            post(handlers::handle_analyze_text),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
