use super::context::AppState;
use super::error::ApiError;
use crate::app::rag::RagPipeline;
use crate::app::similarity::{SimilarityFinder, DEFAULT_SIMILAR_LIMIT};
use crate::domain::api::{QueryRequest, QueryResponse, SimilarResponse};
use crate::utils::error::ContractError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

#[tracing::instrument(skip_all)]
pub async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.question.trim().is_empty() {
        return Err(ContractError::ValidationError {
            message: "Question cannot be empty".to_string(),
        }
        .into());
    }

    let rag = RagPipeline::new(state.store.clone(), state.llm.clone())
        .with_top_k(state.config.rag.top_k);
    let result = rag
        .query_with_filters(&request.question, &request.filters)
        .await;

    Ok(Json(QueryResponse {
        answer: result.answer,
        sources: result.sources,
        documents: result.relevant_documents,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    pub limit: Option<usize>,
}

#[tracing::instrument(skip(state))]
pub async fn handle_similar(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<SimilarResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);
    let similar = SimilarityFinder::new(state.store.clone())
        .find_similar(&document_id, limit)
        .await?;

    Ok(Json(SimilarResponse {
        document: document_id,
        similar,
    }))
}
