//! Job-related API endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use netmhc_core::domain::job::{JobId, JobSnapshot, JobStatus};
use netmhc_core::dto::job::{
    CancelResponse, ExportRequest, ExportResponse, JobList, JobResultResponse, SubmitJob,
    SubmitResponse,
};
use netmhc_core::dto::log::JobLog;
use std::path::PathBuf;

impl OrchestratorClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submit a work script for background execution
    ///
    /// A relative `script_path` is resolved by the server against its
    /// scripts directory.
    pub async fn submit_job(&self, req: &SubmitJob) -> Result<SubmitResponse> {
        let response = self
            .client
            .post(self.url("/jobs"))
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the status snapshot of a job
    pub async fn get_job_status(&self, job_id: JobId) -> Result<JobSnapshot> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}", job_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the result of a completed job
    ///
    /// Fails with a 409 API error while the job is still pending or running
    /// and with a 422 API error if it failed or was cancelled.
    pub async fn get_job_result(&self, job_id: JobId) -> Result<JobResultResponse> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/result", job_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the last `tail` log lines of a job (0 for the full log)
    pub async fn get_job_log(&self, job_id: JobId, tail: usize) -> Result<JobLog> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{}/log", job_id)))
            .query(&[("tail", tail)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Request cancellation of a job
    pub async fn cancel_job(&self, job_id: JobId) -> Result<CancelResponse> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{}/cancel", job_id)))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List jobs in submission order, optionally only those in `status`
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<JobList> {
        let mut request = self.client.get(self.url("/jobs"));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Write a completed job's result to a file on the server host
    pub async fn export_job_result(
        &self,
        job_id: JobId,
        output_file: impl Into<PathBuf>,
    ) -> Result<ExportResponse> {
        let req = ExportRequest {
            output_file: output_file.into(),
        };

        let response = self
            .client
            .post(self.url(&format!("/jobs/{}/export", job_id)))
            .json(&req)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
