//! Prediction tool DTOs
//!
//! Request bodies for the synchronous and submit tools that wrap the bundled
//! NetMHCIIpan scripts. Field names and defaults mirror the tool parameters
//! users already know from the prediction server.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::prediction::Prediction;

pub const DEFAULT_ALLELE: &str = "DRB1_0101";

fn default_allele() -> String {
    DEFAULT_ALLELE.to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeptidePredictionRequest {
    pub input_file: Option<String>,
    /// Comma-separated peptides, used when `input_file` is absent
    pub peptides: Option<String>,
    #[serde(default = "default_allele")]
    pub allele: String,
    pub output_dir: Option<PathBuf>,
    pub job_name: Option<String>,
    #[serde(default)]
    pub summary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProteinAnalysisRequest {
    /// FASTA file with protein sequences
    pub input_file: Option<String>,
    pub protein_sequence: Option<String>,
    #[serde(default = "default_allele")]
    pub allele: String,
    #[serde(default)]
    pub context: bool,
    #[serde(default)]
    pub terminal_anchor: bool,
    #[serde(default)]
    pub sorted_output: bool,
    pub output_dir: Option<PathBuf>,
    pub job_name: Option<String>,
    #[serde(default)]
    pub summary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomMhcPredictionRequest {
    pub input_file: Option<String>,
    pub peptides: Option<String>,
    /// FASTA file with the alpha chain sequence
    pub alpha_seq: Option<String>,
    /// FASTA file with the beta chain sequence
    pub beta_seq: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub job_name: Option<String>,
    #[serde(default)]
    pub summary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchScreeningRequest {
    pub input_file: String,
    /// Comma-separated alleles, e.g. "DRB1_0101,DRB1_1501"
    pub alleles: String,
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub excel: bool,
    pub job_name: Option<String>,
    #[serde(default)]
    pub summary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LargeScreeningRequest {
    pub input_files: Vec<String>,
    #[serde(default = "default_allele")]
    pub allele: String,
    pub output_dir: Option<PathBuf>,
    pub job_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiAlleleScreeningRequest {
    pub input_file: String,
    pub alleles: Vec<String>,
    pub output_dir: Option<PathBuf>,
    pub job_name: Option<String>,
}

// =============================================================================
// Synchronous Tools
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeptideBindingRequest {
    pub input_file: Option<String>,
    pub peptides: Option<String>,
    #[serde(default = "default_allele")]
    pub allele: String,
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub summary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProteinSequenceRequest {
    pub input_file: Option<String>,
    pub protein_sequence: Option<String>,
    #[serde(default = "default_allele")]
    pub allele: String,
    #[serde(default)]
    pub context: bool,
    #[serde(default)]
    pub terminal_anchor: bool,
    #[serde(default)]
    pub sorted_output: bool,
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub summary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomMhcBindingRequest {
    pub input_file: Option<String>,
    pub peptides: Option<String>,
    pub alpha_seq: Option<String>,
    pub beta_seq: Option<String>,
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub summary: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BindingAffinityRequest {
    pub input_file: String,
    /// Comma-separated alleles
    pub alleles: String,
    pub output_file: Option<PathBuf>,
    #[serde(default)]
    pub excel: bool,
    #[serde(default)]
    pub summary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeOutputRequest {
    /// Raw NetMHCIIpan output file
    pub output_file: PathBuf,
}

/// Outcome of a script run in the foreground
///
/// A script that ran but failed is reported here with `success: false`
/// rather than as an HTTP error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRun {
    pub tool: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
}

/// Binding summary of a NetMHCIIpan output file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputAnalysis {
    pub total_predictions: usize,
    pub strong_binders: usize,
    pub weak_binders: usize,
    pub summary_report: String,
    /// First predictions of the table, for preview
    #[serde(default)]
    pub detailed_predictions: Vec<Prediction>,
}

/// Tool names grouped the way the server advertises them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolGroups {
    pub synchronous: Vec<String>,
    pub submit_api: Vec<String>,
    pub job_management: Vec<String>,
    pub utilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub tools: ToolGroups,
    pub scripts_directory: PathBuf,
    pub jobs_directory: PathBuf,
    pub max_parallel_jobs: usize,
}
