//! Log DTOs for the orchestrator API

use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

/// Lines of a job's captured output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLog {
    pub job_id: JobId,
    pub lines: Vec<String>,
    /// Line count of the whole log, regardless of `tail`
    pub total_lines: usize,
}
