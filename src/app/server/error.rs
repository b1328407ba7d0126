use crate::domain::api::ErrorResponse;
use crate::utils::error::ContractError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// ContractError 轉為 JSON 錯誤回應
#[derive(Debug)]
pub struct ApiError(pub ContractError);

impl From<ContractError> for ApiError {
    fn from(err: ContractError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ContractError::ValidationError { .. } | ContractError::DocumentError { .. } => {
                StatusCode::BAD_REQUEST
            }
            ContractError::DocumentNotFound { .. } | ContractError::VectorStoreNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ContractError::ApiError { .. } | ContractError::HttpError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error=?self.0, "request failed");
        } else {
            tracing::debug!(error=%self.0, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
