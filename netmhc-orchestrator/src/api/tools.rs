//! Tool API Handlers
//!
//! Synchronous endpoints run a bundled prediction script and answer with its
//! output. Submit endpoints start the same scripts as background jobs.

use axum::{Json, extract::State, http::StatusCode};
use netmhc_core::dto::job::SubmitResponse;
use netmhc_core::dto::tools::{
    AnalyzeOutputRequest, BatchScreeningRequest, BindingAffinityRequest, CustomMhcBindingRequest,
    CustomMhcPredictionRequest, LargeScreeningRequest, MultiAlleleScreeningRequest,
    OutputAnalysis, PeptideBindingRequest, PeptidePredictionRequest, ProteinAnalysisRequest,
    ProteinSequenceRequest, ToolRun,
};

use crate::api::error::{ApiResult, blocking};
use crate::api::job::submitted;
use crate::service::tools_service::ToolJob;
use crate::service::{job_service::JobManager, tools_service};

type Submitted = ApiResult<(StatusCode, Json<SubmitResponse>)>;

// =============================================================================
// Synchronous Tools
// =============================================================================

async fn run(manager: &JobManager, job: ToolJob) -> ApiResult<Json<ToolRun>> {
    Ok(Json(job.run(manager.config()).await))
}

/// POST /tools/predict-peptide-binding
pub async fn predict_peptide_binding(
    State(manager): State<JobManager>,
    Json(req): Json<PeptideBindingRequest>,
) -> ApiResult<Json<ToolRun>> {
    run(&manager, tools_service::predict_peptide_binding(&req)?).await
}

/// POST /tools/analyze-protein-sequence
pub async fn analyze_protein_sequence(
    State(manager): State<JobManager>,
    Json(req): Json<ProteinSequenceRequest>,
) -> ApiResult<Json<ToolRun>> {
    run(&manager, tools_service::analyze_protein_sequence(&req)?).await
}

/// POST /tools/predict-custom-mhc-binding
pub async fn predict_custom_mhc_binding(
    State(manager): State<JobManager>,
    Json(req): Json<CustomMhcBindingRequest>,
) -> ApiResult<Json<ToolRun>> {
    run(&manager, tools_service::predict_custom_mhc_binding(&req)?).await
}

/// POST /tools/predict-binding-affinity
pub async fn predict_binding_affinity(
    State(manager): State<JobManager>,
    Json(req): Json<BindingAffinityRequest>,
) -> ApiResult<Json<ToolRun>> {
    run(&manager, tools_service::predict_binding_affinity(&req)?).await
}

/// POST /tools/analyze-output
pub async fn analyze_output(
    Json(req): Json<AnalyzeOutputRequest>,
) -> ApiResult<Json<OutputAnalysis>> {
    let analysis = blocking(move || tools_service::analyze_netmhcpan_output(&req)).await?;
    Ok(Json(analysis))
}

// =============================================================================
// Submit Tools
// =============================================================================

async fn submit(manager: JobManager, job: ToolJob) -> Submitted {
    let submitter = manager.clone();
    let job_id = blocking(move || job.submit(&submitter)).await?;
    submitted(&manager, job_id)
}

/// POST /tools/peptide-prediction
pub async fn peptide_prediction(
    State(manager): State<JobManager>,
    Json(req): Json<PeptidePredictionRequest>,
) -> Submitted {
    submit(manager, tools_service::peptide_prediction(&req)?).await
}

/// POST /tools/protein-analysis
pub async fn protein_analysis(
    State(manager): State<JobManager>,
    Json(req): Json<ProteinAnalysisRequest>,
) -> Submitted {
    submit(manager, tools_service::protein_analysis(&req)?).await
}

/// POST /tools/custom-mhc-prediction
pub async fn custom_mhc_prediction(
    State(manager): State<JobManager>,
    Json(req): Json<CustomMhcPredictionRequest>,
) -> Submitted {
    submit(manager, tools_service::custom_mhc_prediction(&req)?).await
}

/// POST /tools/batch-screening
pub async fn batch_screening(
    State(manager): State<JobManager>,
    Json(req): Json<BatchScreeningRequest>,
) -> Submitted {
    submit(manager, tools_service::batch_multi_allele_screening(&req)?).await
}

/// POST /tools/large-screening
pub async fn large_screening(
    State(manager): State<JobManager>,
    Json(req): Json<LargeScreeningRequest>,
) -> Submitted {
    submit(manager, tools_service::large_peptide_screening(&req)?).await
}

/// POST /tools/multi-allele-screening
pub async fn multi_allele_screening(
    State(manager): State<JobManager>,
    Json(req): Json<MultiAlleleScreeningRequest>,
) -> Submitted {
    submit(manager, tools_service::multi_allele_screening(&req)?).await
}
