//! Core domain types
//!
//! These types are shared between the orchestrator (which persists and mutates
//! them) and the client side (which only reads snapshots of them).

pub mod job;
pub mod prediction;
