//! NetMHCIIpan job orchestrator
//!
//! Runs prediction scripts as supervised background processes and answers
//! status, result, log, cancel and list queries while they run.

pub mod api;
pub mod config;
pub mod error;
pub mod repository;
pub mod service;

pub use config::Config;
pub use error::{OrchestratorError, Result};
pub use service::job_service::{CancelAck, JobManager};
