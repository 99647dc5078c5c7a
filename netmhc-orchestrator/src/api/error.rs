//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::OrchestratorError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// Request conflicts with the job's current status
    Conflict { kind: &'static str, message: String },
    JobFailed { message: String, exit_code: Option<i32> },
    JobCancelled(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": msg, "kind": "not_found" }),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": msg, "kind": "validation" }),
            ),
            ApiError::Conflict { kind, message } => (
                StatusCode::CONFLICT,
                json!({ "error": message, "kind": kind }),
            ),
            ApiError::JobFailed { message, exit_code } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": message, "kind": "failed", "exit_code": exit_code }),
            ),
            ApiError::JobCancelled(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": msg, "kind": "cancelled" }),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error", "kind": "storage" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        let kind = err.kind();
        match err {
            OrchestratorError::Validation(msg) => ApiError::BadRequest(msg),
            OrchestratorError::NotFound(_) => ApiError::NotFound(err.to_string()),
            OrchestratorError::NotReady { .. } | OrchestratorError::AlreadyTerminal { .. } => {
                ApiError::Conflict {
                    kind,
                    message: err.to_string(),
                }
            }
            OrchestratorError::JobFailed {
                exit_code, error, ..
            } => ApiError::JobFailed {
                message: error,
                exit_code,
            },
            OrchestratorError::JobCancelled(_) => ApiError::JobCancelled(err.to_string()),
            OrchestratorError::Storage(e) => ApiError::InternalError(e.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Runs façade work that touches the disk on the blocking pool
pub async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::InternalError(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}
