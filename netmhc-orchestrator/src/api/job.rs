//! Job API Handlers
//!
//! HTTP endpoints for the job façade: submit, status, result, log, cancel,
//! list and export.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use netmhc_core::domain::job::{JobId, JobSnapshot, JobStatus};
use netmhc_core::dto::job::{
    CancelResponse, ExportRequest, ExportResponse, JobList, JobResultResponse, SubmitJob,
    SubmitResponse,
};
use netmhc_core::dto::log::JobLog;
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult, blocking};
use crate::service::{
    job_service::{self, JobManager},
    tools_service,
};

// =============================================================================
// Job Lifecycle Endpoints
// =============================================================================

/// POST /jobs
/// Submit a work script for background execution
pub async fn submit_job(
    State(manager): State<JobManager>,
    Json(req): Json<SubmitJob>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    tracing::debug!("Submitting script: {}", req.script_path.display());

    let job_id = blocking({
        let manager = manager.clone();
        move || manager.submit_job(&req.script_path, req.args, req.job_name.as_deref())
    })
    .await?;

    submitted(&manager, job_id)
}

/// GET /jobs/{id}
pub async fn get_job(
    State(manager): State<JobManager>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let job_id = job_service::parse_job_id(&id)?;
    Ok(Json(manager.get_job_status(job_id)?))
}

/// GET /jobs/{id}/result
pub async fn get_job_result(
    State(manager): State<JobManager>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResultResponse>> {
    let job_id = job_service::parse_job_id(&id)?;
    Ok(Json(manager.get_job_result(job_id)?))
}

/// GET /jobs/{id}/log
/// Get job log lines
///
/// Query parameters:
/// - `tail` (optional, default 50): number of trailing lines, 0 for the whole log
pub async fn get_job_log(
    State(manager): State<JobManager>,
    Path(id): Path<String>,
    Query(params): Query<LogQuery>,
) -> ApiResult<Json<JobLog>> {
    let job_id = job_service::parse_job_id(&id)?;
    let log = blocking(move || manager.get_job_log(job_id, params.tail)).await?;
    Ok(Json(log))
}

/// POST /jobs/{id}/cancel
pub async fn cancel_job(
    State(manager): State<JobManager>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let job_id = job_service::parse_job_id(&id)?;
    let ack = blocking(move || manager.cancel_job(job_id)).await?;

    Ok(Json(CancelResponse {
        job_id,
        ack: true,
        message: ack.message().to_string(),
    }))
}

/// GET /jobs
/// List jobs in submission order
///
/// Query parameters:
/// - `status` (optional): only jobs in this status
pub async fn list_jobs(
    State(manager): State<JobManager>,
    Query(params): Query<ListQuery>,
) -> ApiResult<Json<JobList>> {
    let status = match params.status.as_deref() {
        Some(raw) => Some(
            raw.parse::<JobStatus>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };

    Ok(Json(JobList::from(manager.list_jobs(status))))
}

/// POST /jobs/{id}/export
/// Write a completed job's result to a file
pub async fn export_job_result(
    State(manager): State<JobManager>,
    Path(id): Path<String>,
    Json(req): Json<ExportRequest>,
) -> ApiResult<Json<ExportResponse>> {
    let job_id = job_service::parse_job_id(&id)?;
    let exported = blocking(move || {
        tools_service::export_job_result(&manager, job_id, &req.output_file)
    })
    .await?;
    Ok(Json(exported))
}

// =============================================================================
// Helpers
// =============================================================================

/// Builds the 202 response for a freshly submitted job
pub(crate) fn submitted(
    manager: &JobManager,
    job_id: JobId,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let snapshot = manager.get_job_status(job_id)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: snapshot.status,
            message: format!(
                "Job '{}' submitted; poll /jobs/{} for progress",
                snapshot.name, job_id
            ),
        }),
    ))
}

// =============================================================================
// Query Parameters
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(default = "default_tail")]
    pub tail: usize,
}

fn default_tail() -> usize {
    50
}
