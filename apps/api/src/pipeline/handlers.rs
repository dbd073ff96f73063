use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::info;

use crate::document::{document_id_for, DocumentFormat, RawDocument};
use crate::errors::{AppError, PipelineError};
use crate::pipeline::{Analysis, BatchReport, DocumentFailure};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeTextRequest {
    pub document_id: Option<String>,
    pub text: String,
}

/// One file part of a multipart upload. A `file` part sent without a file
/// name is kept so the batch route can report it in place.
struct Upload {
    file_name: Option<String>,
    content: Bytes,
}

/// POST /api/v1/candidates/analyze
/// Multipart with a single `file` part.
pub async fn handle_analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Analysis>, AppError> {
    let upload = read_uploads(multipart)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Validation("missing 'file' part".to_string()))?;

    let file_name = upload.file_name.ok_or_else(nameless_upload)?;
    let format = DocumentFormat::from_file_name(&file_name)?;
    let document = RawDocument::new(document_id_for(&file_name), format, upload.content)
        .with_file_name(file_name);

    info!(document_id = %document.id, "Analyzing candidate document");
    let analysis = run_blocking(state, document).await?;
    Ok(Json(analysis))
}

/// POST /api/v1/candidates/analyze-batch
/// Multipart with any number of `file` parts. Unsupported files are reported
/// as failures next to documents that fail analysis.
pub async fn handle_analyze_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BatchReport>, AppError> {
    let uploads = read_uploads(multipart).await?;
    if uploads.is_empty() {
        return Err(AppError::Validation("no 'file' parts in upload".to_string()));
    }
    info!(files = uploads.len(), "Analyzing candidate batch");

    let mut documents = Vec::with_capacity(uploads.len());
    let mut accepted_positions = Vec::with_capacity(uploads.len());
    let mut rejected = Vec::new();

    for (position, upload) in uploads.into_iter().enumerate() {
        let id = document_id_for(upload.file_name.as_deref().unwrap_or_default());
        let format = match upload.file_name.as_deref() {
            Some(name) => DocumentFormat::from_file_name(name),
            None => Err(nameless_upload()),
        };
        match format {
            Ok(format) => {
                accepted_positions.push(position);
                let mut document = RawDocument::new(id, format, upload.content);
                if let Some(name) = upload.file_name {
                    document = document.with_file_name(name);
                }
                documents.push(document);
            }
            Err(e) => rejected.push(DocumentFailure {
                document_id: id,
                file_name: upload.file_name,
                position,
                code: e.code().to_string(),
                message: e.to_string(),
            }),
        }
    }

    let report = state
        .pipeline
        .analyze_batch(documents)
        .await
        .with_rejected(&accepted_positions, rejected);
    Ok(Json(report))
}

/// POST /api/v1/candidates/analyze-text
/// For callers that already hold the resume text.
pub async fn handle_analyze_text(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeTextRequest>,
) -> Result<Json<Analysis>, AppError> {
    let id = req
        .document_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| document_id_for("text"));
    let document = RawDocument::plain_text(id, req.text);

    let analysis = run_blocking(state, document).await?;
    Ok(Json(analysis))
}

async fn run_blocking(state: AppState, document: RawDocument) -> Result<Analysis, AppError> {
    let analysis = tokio::task::spawn_blocking(move || state.pipeline.analyze(&document))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in analysis: {e}")))??;
    Ok(analysis)
}

/// Collects every `file` part (or any part carrying a file name).
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, AppError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content = field.bytes().await.map_err(|e| {
            AppError::Validation(format!(
                "failed to read '{}': {e}",
                file_name.as_deref().unwrap_or("file")
            ))
        })?;
        uploads.push(Upload { file_name, content });
    }
    Ok(uploads)
}

fn nameless_upload() -> PipelineError {
    PipelineError::UnsupportedFormat("upload has no file name".to_string())
}
