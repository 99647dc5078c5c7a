//! ID resolver module
//!
//! Lets users type a short, unambiguous prefix instead of a full job id. A
//! full id is used as-is; a prefix is matched against the job list.

use anyhow::{Context, Result, anyhow};
use netmhc_core::domain::job::JobId;
use netmhc_client::OrchestratorClient;

/// Resolve a job ID or prefix to a full job id
///
/// # Errors
/// Returns an error if:
/// - No job matches the prefix
/// - Multiple jobs match the prefix (ambiguous)
/// - API call fails
pub async fn resolve_job_id(client: &OrchestratorClient, input: &str) -> Result<JobId> {
    // If it's already a full id, return it
    if let Ok(job_id) = input.parse::<JobId>() {
        return Ok(job_id);
    }

    let jobs = client
        .list_jobs(None)
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    match_prefix(jobs.jobs.iter().map(|j| j.job_id), input)
}

/// Picks the single id starting with `prefix`
fn match_prefix(ids: impl IntoIterator<Item = JobId>, prefix: &str) -> Result<JobId> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        return Err(anyhow!("Job ID cannot be empty"));
    }

    let matches: Vec<JobId> = ids
        .into_iter()
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No job found with ID starting with '{}'", prefix)),
        [only] => Ok(*only),
        _ => {
            let ids: Vec<String> = matches.iter().map(JobId::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
