use axum::{extract::State, Json};

use crate::pipeline::HealthStatus;
use crate::state::AppState;

/// GET /health
/// Returns service version plus the size of the loaded vocabulary.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.pipeline.health())
}
