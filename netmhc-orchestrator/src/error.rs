//! Orchestrator error types
//!
//! Errors surfaced synchronously to callers of the job façade. Failures that
//! happen while a job executes are recorded on the job instead and only show up
//! here when a caller asks for that job's result.

use netmhc_core::domain::job::{JobId, JobStatus};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Malformed submission; no job was created
    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {job_id} is not finished yet (status: {status})")]
    NotReady { job_id: JobId, status: JobStatus },

    #[error("job {job_id} cannot be cancelled: already {status}")]
    AlreadyTerminal { job_id: JobId, status: JobStatus },

    #[error("job {job_id} failed: {error}")]
    JobFailed {
        job_id: JobId,
        exit_code: Option<i32>,
        error: String,
    },

    #[error("job {0} was cancelled")]
    JobCancelled(JobId),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl OrchestratorError {
    pub fn not_found(job_id: impl std::fmt::Display) -> Self {
        Self::NotFound(job_id.to_string())
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::NotReady { .. } => "not_ready",
            Self::AlreadyTerminal { .. } => "already_terminal",
            Self::JobFailed { .. } => "failed",
            Self::JobCancelled(_) => "cancelled",
            Self::Storage(_) => "storage",
        }
    }
}
