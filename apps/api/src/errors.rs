use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the extraction-and-scoring pipeline.
///
/// Only total absence of signal or degenerate configuration is fatal; sparse
/// fields (unknown degree, unmatched skill) never surface here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("document contains no usable text")]
    EmptyInput,

    #[error("no skills, education or experience could be extracted")]
    InsufficientData,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("document could not be read: {0}")]
    DocumentUnreadable(String),
}

impl PipelineError {
    /// Stable machine-readable code, shared by HTTP bodies and batch failure entries.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::EmptyInput => "EMPTY_INPUT",
            PipelineError::InsufficientData => "INSUFFICIENT_DATA",
            PipelineError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            PipelineError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            PipelineError::DocumentUnreadable(_) => "DOCUMENT_UNREADABLE",
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Pipeline(e) => {
                let status = match e {
                    PipelineError::EmptyInput | PipelineError::InsufficientData => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    PipelineError::UnsupportedFormat(_) | PipelineError::DocumentUnreadable(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    PipelineError::InvalidConfiguration(_) => {
                        tracing::error!("Pipeline configuration error: {e}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.code(), e.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
