//! Health Check API Handler
//!
//! Liveness and server description endpoints.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use netmhc_core::dto::tools::ServerInfo;

use crate::service::{job_service::JobManager, tools_service};

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /info
pub async fn server_info(State(manager): State<JobManager>) -> Json<ServerInfo> {
    Json(tools_service::server_info(&manager))
}
