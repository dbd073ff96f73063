use crate::config::Config;
use crate::pipeline::Pipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Compiled vocabulary and scoring engine, shared read-only by every request.
    pub pipeline: Pipeline,
}
