//! Job DTOs for the orchestrator API

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::job::{JobArgs, JobId, JobSnapshot, JobStatus};

/// Request to submit a work script for background execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJob {
    pub script_path: PathBuf,
    #[serde(default)]
    pub args: JobArgs,
    #[serde(default)]
    pub job_name: Option<String>,
}

/// Acknowledgement of an accepted submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

/// Result of a completed job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResultResponse {
    pub job_id: JobId,
    pub result: String,
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    /// Cancellation was requested; the final status is observed via status queries
    pub ack: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobList {
    pub jobs: Vec<JobSnapshot>,
    pub total: usize,
}

impl From<Vec<JobSnapshot>> for JobList {
    fn from(jobs: Vec<JobSnapshot>) -> Self {
        let total = jobs.len();
        Self { jobs, total }
    }
}

/// Request to write a completed job's result to a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub job_id: JobId,
    pub output_file: PathBuf,
    pub bytes_written: usize,
}
