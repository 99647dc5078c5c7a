//! NetMHC Core
//!
//! Core types shared by the NetMHCIIpan job orchestrator, its HTTP client and the CLI.
//!
//! This crate contains:
//! - Domain types: the persisted Job Record, job status machine and argument values
//! - NetMHCIIpan prediction table parsing and binder classification
//! - DTOs: request/response bodies exchanged over the orchestrator API

pub mod domain;
pub mod dto;
