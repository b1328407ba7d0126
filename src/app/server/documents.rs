use super::context::AppState;
use super::error::ApiError;
use crate::app::ingest::{DocumentSource, IngestPipeline};
use crate::core::engine::IngestEngine;
use crate::domain::api::{
    ContentEncoding, DocumentListResponse, UploadDocument, UploadRequest, UploadResponse,
};
use crate::utils::error::ContractError;
use axum::extract::State;
use axum::Json;
use base64::prelude::{Engine as _, BASE64_STANDARD};

pub async fn handle_list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    Json(DocumentListResponse {
        documents: state.store.sources().await,
        chunk_count: state.store.len().await,
    })
}

#[tracing::instrument(skip_all)]
pub async fn handle_upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, ApiError> {
    if request.documents.is_empty() {
        return Err(ContractError::ValidationError {
            message: "No documents provided".to_string(),
        }
        .into());
    }

    let files = request
        .documents
        .into_iter()
        .map(decode_upload)
        .collect::<Result<Vec<_>, _>>()?;

    let pipeline = IngestPipeline::new(
        state.processor.clone(),
        DocumentSource::Uploads(files),
        state.store.clone(),
    );
    let engine = IngestEngine::new(pipeline);
    let summary = engine.run().await?;

    Ok(Json(UploadResponse {
        status: "success".to_string(),
        document_count: summary.document_count,
        chunk_count: summary.chunk_count,
        skipped: engine.pipeline().skipped().await,
    }))
}

/// 上傳內容可為純文字或 base64 (PDF、DOCX)
fn decode_upload(upload: UploadDocument) -> Result<(String, Vec<u8>), ContractError> {
    // 只保留檔名，避免路徑成為來源名稱
    let name = upload
        .name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string();
    if name.trim().is_empty() {
        return Err(ContractError::ValidationError {
            message: "Document name cannot be empty".to_string(),
        });
    }

    let bytes = match upload.encoding {
        ContentEncoding::Text => upload.content.into_bytes(),
        ContentEncoding::Base64 => BASE64_STANDARD.decode(upload.content.trim()).map_err(|e| {
            ContractError::ValidationError {
                message: format!("Invalid base64 content for '{}': {}", name, e),
            }
        })?,
    };
    Ok((name, bytes))
}
