//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Job state lives on disk under the jobs directory, one sub-directory per job.

pub mod job;
pub mod log;

// Re-export for convenience
pub use job as job_repository;
pub use log as log_repository;
