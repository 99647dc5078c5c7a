//! Prediction Tool Service
//!
//! Builds argument mappings for the bundled NetMHCIIpan scripts and either
//! runs them in the foreground (synchronous tools) or submits them as
//! background jobs. The scripts themselves (prediction, CSV/Excel output) stay
//! outside the orchestrator.

use netmhc_core::domain::job::{ArgValue, JobArgs, JobId};
use netmhc_core::domain::prediction::PredictionTable;
use netmhc_core::dto::job::ExportResponse;
use netmhc_core::dto::tools::{
    AnalyzeOutputRequest, BatchScreeningRequest, BindingAffinityRequest, CustomMhcBindingRequest,
    CustomMhcPredictionRequest, LargeScreeningRequest, MultiAlleleScreeningRequest,
    OutputAnalysis, PeptideBindingRequest, PeptidePredictionRequest, ProteinAnalysisRequest,
    ProteinSequenceRequest, ServerInfo, ToolGroups, ToolRun,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{OrchestratorError, Result};
use crate::service::job_service::JobManager;
use crate::service::supervisor::{self, ProcessError};

pub const PEPTIDE_SCRIPT: &str = "peptide_prediction.py";
pub const PROTEIN_SCRIPT: &str = "protein_analysis.py";
pub const CUSTOM_MHC_SCRIPT: &str = "custom_allele_prediction.py";
pub const BATCH_SCRIPT: &str = "batch_multi_allele.py";

/// Predictions returned by `analyze_netmhcpan_output`
const PREVIEW_PREDICTIONS: usize = 10;

/// A fully assembled submission for one of the bundled scripts
#[derive(Debug, Clone, PartialEq)]
pub struct ToolJob {
    pub script: &'static str,
    pub args: JobArgs,
    pub name: String,
}

impl ToolJob {
    fn new(script: &'static str, name: String) -> Self {
        Self {
            script,
            args: JobArgs::new(),
            name,
        }
    }

    fn arg(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.args.insert(name.to_string(), value.into());
        self
    }

    fn output(self, output_dir: Option<&Path>, file_name: String) -> Self {
        match output_dir {
            Some(dir) => {
                let path = dir.join(file_name);
                self.arg("output", path.to_string_lossy().into_owned())
            }
            None => self,
        }
    }

    fn output_file(self, output_file: Option<&Path>) -> Self {
        match output_file {
            Some(path) => self.arg("output", path.to_string_lossy().into_owned()),
            None => self,
        }
    }

    /// Submits the job; the script is resolved against the scripts directory
    pub fn submit(self, manager: &JobManager) -> Result<JobId> {
        manager.submit_job(self.script, self.args, Some(&self.name))
    }

    /// Runs the script in the foreground, bounded by `sync_timeout`
    ///
    /// A script that cannot start, fails or runs out of time is reported in
    /// the returned [`ToolRun`], never as an error.
    pub async fn run(self, config: &Config) -> ToolRun {
        let script = config.scripts_dir.join(self.script);
        let invocation = supervisor::build_command(&script, &self.args, &config.interpreters);

        let outcome =
            supervisor::run_to_completion(&script, &invocation, config.sync_timeout).await;

        let run = match outcome {
            Ok(captured) => {
                let tail = last_lines(&captured.stderr, config.error_tail_lines);
                let failure = match captured.status.code() {
                    Some(0) => None,
                    Some(code) => Some(ProcessError::Exit { code, tail }),
                    None => Some(ProcessError::Signalled { tail }),
                };

                ToolRun {
                    tool: self.name,
                    success: failure.is_none(),
                    exit_code: captured.status.code(),
                    stdout: captured.stdout,
                    stderr: captured.stderr,
                    error: failure.map(|e| e.to_string()),
                }
            }
            Err(err) => ToolRun {
                tool: self.name,
                success: false,
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                error: Some(err.to_string()),
            },
        };

        if run.success {
            info!("{} finished", run.tool);
        } else {
            warn!("{} failed: {}", run.tool, run.error.as_deref().unwrap_or_default());
        }

        run
    }
}

// =============================================================================
// Synchronous Tools
// =============================================================================

pub fn predict_peptide_binding(req: &PeptideBindingRequest) -> Result<ToolJob> {
    let job = ToolJob::new(PEPTIDE_SCRIPT, "predict_peptide_binding".to_string())
        .arg("allele", req.allele.as_str())
        .arg("summary", req.summary);

    let job = match (present(&req.input_file), present(&req.peptides)) {
        (Some(input), _) => job.arg("input", input),
        (None, Some(peptides)) => job.arg("peptides", peptides),
        (None, None) => return Err(missing_input("input_file or peptides")),
    };

    Ok(job.output_file(req.output_file.as_deref()))
}

pub fn analyze_protein_sequence(req: &ProteinSequenceRequest) -> Result<ToolJob> {
    let job = ToolJob::new(PROTEIN_SCRIPT, "analyze_protein_sequence".to_string())
        .arg("allele", req.allele.as_str())
        .arg("context", req.context)
        .arg("terminal_anchor", req.terminal_anchor)
        .arg("sorted", req.sorted_output)
        .arg("summary", req.summary);

    let job = match (present(&req.input_file), present(&req.protein_sequence)) {
        (Some(input), _) => job.arg("input", input),
        (None, Some(sequence)) => job.arg("protein_sequence", sequence),
        (None, None) => return Err(missing_input("input_file or protein_sequence")),
    };

    Ok(job.output_file(req.output_file.as_deref()))
}

pub fn predict_custom_mhc_binding(req: &CustomMhcBindingRequest) -> Result<ToolJob> {
    let mut job = ToolJob::new(CUSTOM_MHC_SCRIPT, "predict_custom_mhc_binding".to_string())
        .arg("summary", req.summary);

    job = match (present(&req.input_file), present(&req.peptides)) {
        (Some(input), _) => job.arg("input", input),
        (None, Some(peptides)) => job.arg("peptides", peptides),
        (None, None) => return Err(missing_input("input_file or peptides")),
    };

    if let Some(alpha) = present(&req.alpha_seq) {
        job = job.arg("alpha_seq", alpha);
    }
    if let Some(beta) = present(&req.beta_seq) {
        job = job.arg("beta_seq", beta);
    }

    Ok(job.output_file(req.output_file.as_deref()))
}

pub fn predict_binding_affinity(req: &BindingAffinityRequest) -> Result<ToolJob> {
    let input = require(&req.input_file, "input_file")?;
    let alleles = split_alleles(&req.alleles);
    if alleles.is_empty() {
        return Err(no_alleles());
    }

    let job = ToolJob::new(BATCH_SCRIPT, "predict_binding_affinity".to_string())
        .arg("input", input)
        .arg("alleles", alleles.join(","))
        .arg("excel", req.excel)
        .arg("summary", req.summary);

    Ok(job.output_file(req.output_file.as_deref()))
}

/// Summarizes a raw NetMHCIIpan output file
pub fn analyze_netmhcpan_output(req: &AnalyzeOutputRequest) -> Result<OutputAnalysis> {
    let path = &req.output_file;
    if path.as_os_str().is_empty() {
        return Err(missing_input("output_file"));
    }

    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OrchestratorError::Validation(format!(
                "output file not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let table = PredictionTable::parse(&String::from_utf8_lossy(&raw));
    info!(
        "Analyzed {}: {} predictions",
        path.display(),
        table.predictions.len()
    );

    Ok(OutputAnalysis {
        total_predictions: table.predictions.len(),
        strong_binders: table.strong_binders().count(),
        weak_binders: table.weak_binders().count(),
        summary_report: table.summary_report(),
        detailed_predictions: table
            .predictions
            .into_iter()
            .take(PREVIEW_PREDICTIONS)
            .collect(),
    })
}

// =============================================================================
// Submit Tools
// =============================================================================

pub fn peptide_prediction(req: &PeptidePredictionRequest) -> Result<ToolJob> {
    let job = ToolJob::new(PEPTIDE_SCRIPT, name_or(&req.job_name, "peptide_prediction"))
        .arg("allele", req.allele.as_str())
        .arg("summary", req.summary);

    let job = match (present(&req.input_file), present(&req.peptides)) {
        (Some(input), _) => job.arg("input", input),
        (None, Some(peptides)) => job.arg("peptides", peptides),
        (None, None) => return Err(missing_input("input_file or peptides")),
    };

    Ok(job.output(
        req.output_dir.as_deref(),
        format!("peptide_pred_{}.txt", output_stem(&req.job_name)),
    ))
}

pub fn protein_analysis(req: &ProteinAnalysisRequest) -> Result<ToolJob> {
    let job = ToolJob::new(PROTEIN_SCRIPT, name_or(&req.job_name, "protein_analysis"))
        .arg("allele", req.allele.as_str())
        .arg("context", req.context)
        .arg("terminal_anchor", req.terminal_anchor)
        .arg("sorted", req.sorted_output)
        .arg("summary", req.summary);

    let job = match (present(&req.input_file), present(&req.protein_sequence)) {
        (Some(input), _) => job.arg("input", input),
        (None, Some(sequence)) => job.arg("protein_sequence", sequence),
        (None, None) => return Err(missing_input("input_file or protein_sequence")),
    };

    Ok(job.output(
        req.output_dir.as_deref(),
        format!("protein_analysis_{}.txt", output_stem(&req.job_name)),
    ))
}

pub fn custom_mhc_prediction(req: &CustomMhcPredictionRequest) -> Result<ToolJob> {
    let mut job = ToolJob::new(
        CUSTOM_MHC_SCRIPT,
        name_or(&req.job_name, "custom_mhc_prediction"),
    )
    .arg("summary", req.summary);

    job = match (present(&req.input_file), present(&req.peptides)) {
        (Some(input), _) => job.arg("input", input),
        (None, Some(peptides)) => job.arg("peptides", peptides),
        (None, None) => return Err(missing_input("input_file or peptides")),
    };

    if let Some(alpha) = present(&req.alpha_seq) {
        job = job.arg("alpha_seq", alpha);
    }
    if let Some(beta) = present(&req.beta_seq) {
        job = job.arg("beta_seq", beta);
    }

    Ok(job.output(
        req.output_dir.as_deref(),
        format!("custom_mhc_{}.txt", output_stem(&req.job_name)),
    ))
}

pub fn batch_multi_allele_screening(req: &BatchScreeningRequest) -> Result<ToolJob> {
    let input = require(&req.input_file, "input_file")?;
    let alleles = split_alleles(&req.alleles);
    if alleles.is_empty() {
        return Err(no_alleles());
    }

    let default_name = format!("batch_screening_{}_alleles", alleles.len());
    let extension = if req.excel { "xlsx" } else { "csv" };

    let job = ToolJob::new(BATCH_SCRIPT, name_or(&req.job_name, &default_name))
        .arg("input", input)
        .arg("alleles", alleles.join(","))
        .arg("excel", req.excel)
        .arg("summary", req.summary);

    Ok(job.output(
        req.output_dir.as_deref(),
        format!(
            "batch_multi_allele_{}.{}",
            output_stem(&req.job_name),
            extension
        ),
    ))
}

pub fn large_peptide_screening(req: &LargeScreeningRequest) -> Result<ToolJob> {
    let inputs: Vec<&str> = req
        .input_files
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect();

    if inputs.is_empty() {
        return Err(missing_input("input_files"));
    }

    let default_name = format!("large_screening_{}_files", inputs.len());

    let mut job = ToolJob::new(PEPTIDE_SCRIPT, name_or(&req.job_name, &default_name))
        .arg("input", inputs.join(","))
        .arg("allele", req.allele.as_str())
        .arg("summary", true);

    if let Some(dir) = &req.output_dir {
        job = job.arg("output_dir", dir.to_string_lossy().into_owned());
    }

    Ok(job)
}

pub fn multi_allele_screening(req: &MultiAlleleScreeningRequest) -> Result<ToolJob> {
    let input = require(&req.input_file, "input_file")?;
    let alleles: Vec<&str> = req
        .alleles
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .collect();

    if alleles.is_empty() {
        return Err(no_alleles());
    }

    let default_name = format!("screening_{}_alleles", alleles.len());

    let job = ToolJob::new(BATCH_SCRIPT, name_or(&req.job_name, &default_name))
        .arg("input", input)
        .arg("alleles", alleles.join(","))
        .arg("summary", true)
        .arg("excel", true);

    Ok(job.output(
        req.output_dir.as_deref(),
        format!("multi_allele_screening_{}.xlsx", output_stem(&req.job_name)),
    ))
}

// =============================================================================
// Utilities
// =============================================================================

/// Writes the result text of a completed job to `output_file`
pub fn export_job_result(
    manager: &JobManager,
    job_id: JobId,
    output_file: &Path,
) -> Result<ExportResponse> {
    if output_file.as_os_str().is_empty() {
        return Err(OrchestratorError::Validation(
            "output_file cannot be empty".to_string(),
        ));
    }

    let result = manager.get_job_result(job_id)?;
    std::fs::write(output_file, &result.result)?;

    info!(job_id = %job_id, "Exported result to {}", output_file.display());

    Ok(ExportResponse {
        job_id,
        output_file: output_file.to_path_buf(),
        bytes_written: result.result.len(),
    })
}

pub fn server_info(manager: &JobManager) -> ServerInfo {
    let config = manager.config();

    ServerInfo {
        name: "NetMHCIIpan-4.3 Prediction Server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Background job orchestration for NetMHCIIpan MHC II binding prediction"
            .to_string(),
        tools: ToolGroups {
            synchronous: to_strings(&[
                "predict_peptide_binding",
                "analyze_protein_sequence",
                "predict_custom_mhc_binding",
                "predict_binding_affinity",
            ]),
            submit_api: to_strings(&[
                "submit_peptide_prediction",
                "submit_protein_analysis",
                "submit_custom_mhc_prediction",
                "submit_batch_multi_allele_screening",
                "submit_large_peptide_screening",
                "submit_multi_allele_screening",
            ]),
            job_management: to_strings(&[
                "get_job_status",
                "get_job_result",
                "get_job_log",
                "cancel_job",
                "list_jobs",
            ]),
            utilities: to_strings(&[
                "export_job_result",
                "analyze_netmhcpan_output",
                "get_server_info",
            ]),
        },
        scripts_directory: absolute(&config.scripts_dir),
        jobs_directory: absolute(&config.jobs_dir),
        max_parallel_jobs: config.max_parallel_jobs,
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn require<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(missing_input(field))
    } else {
        Ok(value)
    }
}

fn name_or(job_name: &Option<String>, default: &str) -> String {
    present(job_name).unwrap_or(default).to_string()
}

fn output_stem(job_name: &Option<String>) -> &str {
    present(job_name).unwrap_or("output")
}

fn split_alleles(alleles: &str) -> Vec<&str> {
    alleles
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect()
}

fn missing_input(what: &str) -> OrchestratorError {
    OrchestratorError::Validation(format!("{} is required", what))
}

fn no_alleles() -> OrchestratorError {
    OrchestratorError::Validation("at least one allele is required".to_string())
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg_names(job: &ToolJob) -> Vec<&str> {
        job.args.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_peptide_prediction_args() {
        let req = PeptidePredictionRequest {
            peptides: Some("PKYVKQNTLKLAT,GILGFVFTL".to_string()),
            allele: "DRB1_1501".to_string(),
            output_dir: Some(PathBuf::from("/data/out")),
            job_name: Some("flu".to_string()),
            ..Default::default()
        };

        let job = peptide_prediction(&req).unwrap();

        assert_eq!(job.script, PEPTIDE_SCRIPT);
        assert_eq!(job.name, "flu");
        assert_eq!(arg_names(&job), vec!["allele", "summary", "peptides", "output"]);
        assert_eq!(job.args["summary"], ArgValue::Flag(false));
        assert_eq!(
            job.args["output"],
            ArgValue::from("/data/out/peptide_pred_flu.txt")
        );
    }

    #[test]
    fn test_input_file_wins_over_inline_peptides() {
        let req = PeptidePredictionRequest {
            input_file: Some("peptides.txt".to_string()),
            peptides: Some("AAA".to_string()),
            allele: "DRB1_0101".to_string(),
            ..Default::default()
        };

        let job = peptide_prediction(&req).unwrap();

        assert_eq!(job.args["input"], ArgValue::from("peptides.txt"));
        assert!(!job.args.contains_key("peptides"));
        assert_eq!(job.name, "peptide_prediction");
    }

    #[test]
    fn test_missing_input_is_rejected() {
        let req = PeptidePredictionRequest {
            peptides: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            peptide_prediction(&req),
            Err(OrchestratorError::Validation(_))
        ));

        assert!(protein_analysis(&ProteinAnalysisRequest::default()).is_err());
        assert!(custom_mhc_prediction(&CustomMhcPredictionRequest::default()).is_err());
        assert!(large_peptide_screening(&LargeScreeningRequest::default()).is_err());
    }

    #[test]
    fn test_protein_analysis_maps_sorted_flag() {
        let req = ProteinAnalysisRequest {
            protein_sequence: Some("MKTAYIAKQRQISFVKSHFSRQ".to_string()),
            allele: "DRB1_0101".to_string(),
            sorted_output: true,
            output_dir: Some(PathBuf::from("out")),
            ..Default::default()
        };

        let job = protein_analysis(&req).unwrap();

        assert_eq!(job.args["sorted"], ArgValue::Flag(true));
        assert_eq!(job.args["context"], ArgValue::Flag(false));
        assert_eq!(
            job.args["output"],
            ArgValue::from("out/protein_analysis_output.txt")
        );
    }

    #[test]
    fn test_custom_mhc_chains() {
        let req = CustomMhcPredictionRequest {
            input_file: Some("peptides.txt".to_string()),
            alpha_seq: Some("alpha.fsa".to_string()),
            beta_seq: Some("beta.fsa".to_string()),
            ..Default::default()
        };

        let job = custom_mhc_prediction(&req).unwrap();

        assert_eq!(job.script, CUSTOM_MHC_SCRIPT);
        assert_eq!(job.name, "custom_mhc_prediction");
        assert_eq!(
            arg_names(&job),
            vec!["summary", "input", "alpha_seq", "beta_seq"]
        );
    }

    #[test]
    fn test_batch_screening_output_extension() {
        let mut req = BatchScreeningRequest {
            input_file: "peptides.txt".to_string(),
            alleles: "DRB1_0101, DRB1_1501,,DRB1_0401".to_string(),
            output_dir: Some(PathBuf::from("out")),
            ..Default::default()
        };

        let csv = batch_multi_allele_screening(&req).unwrap();
        assert_eq!(csv.name, "batch_screening_3_alleles");
        assert_eq!(
            csv.args["alleles"],
            ArgValue::from("DRB1_0101,DRB1_1501,DRB1_0401")
        );
        assert_eq!(
            csv.args["output"],
            ArgValue::from("out/batch_multi_allele_output.csv")
        );

        req.excel = true;
        let xlsx = batch_multi_allele_screening(&req).unwrap();
        assert_eq!(
            xlsx.args["output"],
            ArgValue::from("out/batch_multi_allele_output.xlsx")
        );
    }

    #[test]
    fn test_empty_allele_list_is_rejected() {
        let batch = BatchScreeningRequest {
            input_file: "peptides.txt".to_string(),
            alleles: " , ".to_string(),
            ..Default::default()
        };
        assert!(batch_multi_allele_screening(&batch).is_err());

        let multi = MultiAlleleScreeningRequest {
            input_file: "peptides.txt".to_string(),
            alleles: vec![],
            ..Default::default()
        };
        assert!(multi_allele_screening(&multi).is_err());
    }

    #[test]
    fn test_large_screening_joins_files() {
        let req = LargeScreeningRequest {
            input_files: vec!["a.txt".to_string(), "b.txt".to_string()],
            allele: "DRB1_0101".to_string(),
            output_dir: Some(PathBuf::from("/data/out")),
            job_name: None,
        };

        let job = large_peptide_screening(&req).unwrap();

        assert_eq!(job.name, "large_screening_2_files");
        assert_eq!(job.args["input"], ArgValue::from("a.txt,b.txt"));
        assert_eq!(job.args["summary"], ArgValue::Flag(true));
        assert_eq!(job.args["output_dir"], ArgValue::from("/data/out"));
        assert!(!job.args.contains_key("output"));
    }

    #[test]
    fn test_sync_peptide_binding_writes_to_output_file() {
        let req = PeptideBindingRequest {
            peptides: Some("PKYVKQNTLKLAT".to_string()),
            allele: "DRB1_1501".to_string(),
            output_file: Some(PathBuf::from("/data/out/pred.txt")),
            ..Default::default()
        };

        let job = predict_peptide_binding(&req).unwrap();

        assert_eq!(job.script, PEPTIDE_SCRIPT);
        assert_eq!(job.name, "predict_peptide_binding");
        assert_eq!(arg_names(&job), vec!["allele", "summary", "peptides", "output"]);
        assert_eq!(job.args["output"], ArgValue::from("/data/out/pred.txt"));
    }

    #[test]
    fn test_sync_tools_without_output_file() {
        let req = ProteinSequenceRequest {
            input_file: Some("proteins.fsa".to_string()),
            allele: "DRB1_0101".to_string(),
            context: true,
            ..Default::default()
        };

        let job = analyze_protein_sequence(&req).unwrap();

        assert_eq!(job.args["context"], ArgValue::Flag(true));
        assert_eq!(job.args["input"], ArgValue::from("proteins.fsa"));
        assert!(!job.args.contains_key("output"));
    }

    #[test]
    fn test_sync_tools_validate_input() {
        assert!(predict_peptide_binding(&PeptideBindingRequest::default()).is_err());
        assert!(analyze_protein_sequence(&ProteinSequenceRequest::default()).is_err());
        assert!(predict_custom_mhc_binding(&CustomMhcBindingRequest::default()).is_err());

        let no_alleles = BindingAffinityRequest {
            input_file: "peptides.txt".to_string(),
            alleles: ",".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            predict_binding_affinity(&no_alleles),
            Err(OrchestratorError::Validation(_))
        ));
    }

    #[test]
    fn test_binding_affinity_args() {
        let req = BindingAffinityRequest {
            input_file: "peptides.txt".to_string(),
            alleles: "DRB1_0101, DRB1_1501".to_string(),
            excel: true,
            ..Default::default()
        };

        let job = predict_binding_affinity(&req).unwrap();

        assert_eq!(job.script, BATCH_SCRIPT);
        assert_eq!(job.args["alleles"], ArgValue::from("DRB1_0101,DRB1_1501"));
        assert_eq!(job.args["excel"], ArgValue::Flag(true));
    }

    #[test]
    fn test_custom_mhc_binding_chains() {
        let req = CustomMhcBindingRequest {
            peptides: Some("AAA,BBB".to_string()),
            beta_seq: Some("beta.fsa".to_string()),
            ..Default::default()
        };

        let job = predict_custom_mhc_binding(&req).unwrap();

        assert_eq!(arg_names(&job), vec!["summary", "peptides", "beta_seq"]);
    }

    #[test]
    fn test_analyze_output_counts_binders() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("pred.txt");
        let mut raw = String::from(" Pos MHC Peptide Core Of Gp Gl Ip Il Icore Identity Score %Rank\n");
        for pos in 1..=12 {
            let rank = if pos == 1 { "0.50" } else if pos <= 3 { "2.00" } else { "40.00" };
            raw.push_str(&format!(
                "{} DRB1_0101 PEPTIDE{:02} CORE 0 0 0 0 0 PEPTIDE{:02} Sequence 0.5 {} NA\n",
                pos, pos, pos, rank
            ));
        }
        std::fs::write(&output, raw).unwrap();

        let analysis = analyze_netmhcpan_output(&AnalyzeOutputRequest {
            output_file: output,
        })
        .unwrap();

        assert_eq!(analysis.total_predictions, 12);
        assert_eq!(analysis.strong_binders, 1);
        assert_eq!(analysis.weak_binders, 2);
        assert_eq!(analysis.detailed_predictions.len(), PREVIEW_PREDICTIONS);
        assert!(analysis.summary_report.contains("PEPTIDE01"));
    }

    #[test]
    fn test_analyze_missing_output_file() {
        let req = AnalyzeOutputRequest {
            output_file: PathBuf::from("/nonexistent/pred.txt"),
        };

        assert!(matches!(
            analyze_netmhcpan_output(&req),
            Err(OrchestratorError::Validation(msg)) if msg.contains("not found")
        ));
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(last_lines("a", 5), "a");
        assert_eq!(last_lines("", 5), "");
    }

    #[test]
    fn test_multi_allele_screening() {
        let req = MultiAlleleScreeningRequest {
            input_file: "peptides.txt".to_string(),
            alleles: vec!["DRB1_0101".to_string(), "DRB1_1501".to_string()],
            output_dir: Some(PathBuf::from("out")),
            job_name: Some("hla".to_string()),
        };

        let job = multi_allele_screening(&req).unwrap();

        assert_eq!(job.script, BATCH_SCRIPT);
        assert_eq!(job.name, "hla");
        assert_eq!(job.args["excel"], ArgValue::Flag(true));
        assert_eq!(
            job.args["output"],
            ArgValue::from("out/multi_allele_screening_hla.xlsx")
        );
    }
}
