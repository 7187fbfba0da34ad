use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::storage::StoreError;

/// Failure modes a REST handler can return.
///
/// `Internal` covers everything without a client-friendly mapping, including
/// store conflicts: a concurrent-modification failure surfaces as a plain 500,
/// matching the update contract (the caller re-fetches and retries by hand).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Task not found")]
    NotFound,
    #[error("Task id in body does not match the id in the path")]
    IdMismatch,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::IdMismatch => StatusCode::BAD_REQUEST,
            ApiError::Internal(e) => {
                error!(err = %e, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
