//! Data Transfer Objects
//!
//! Request and response bodies for the orchestrator API. DTOs are lightweight
//! views of domain entities shaped for the wire.

pub mod job;
pub mod log;
pub mod tools;
