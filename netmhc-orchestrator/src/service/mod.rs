//! Service Module
//!
//! Business logic layer for the orchestrator.
//! The job façade coordinates the store, admission and process supervision;
//! the tool service runs the bundled prediction scripts or submits them as jobs.

pub mod admission;
pub mod job;
pub mod supervisor;
pub mod tools;

// Re-export for convenience
pub use job as job_service;
pub use tools as tools_service;
