//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;
pub mod tools;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::job_service::JobManager;

/// Create the main API router with all endpoints
pub fn create_router(manager: JobManager) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/info", get(health::server_info))
        // Job endpoints
        .route("/jobs", post(job::submit_job).get(job::list_jobs))
        .route("/jobs/{id}", get(job::get_job))
        .route("/jobs/{id}/result", get(job::get_job_result))
        .route("/jobs/{id}/log", get(job::get_job_log))
        .route("/jobs/{id}/cancel", post(job::cancel_job))
        .route("/jobs/{id}/export", post(job::export_job_result))
        // Synchronous tools
        .route(
            "/tools/predict-peptide-binding",
            post(tools::predict_peptide_binding),
        )
        .route(
            "/tools/analyze-protein-sequence",
            post(tools::analyze_protein_sequence),
        )
        .route(
            "/tools/predict-custom-mhc-binding",
            post(tools::predict_custom_mhc_binding),
        )
        .route(
            "/tools/predict-binding-affinity",
            post(tools::predict_binding_affinity),
        )
        .route("/tools/analyze-output", post(tools::analyze_output))
        // Submit tools
        .route("/tools/peptide-prediction", post(tools::peptide_prediction))
        .route("/tools/protein-analysis", post(tools::protein_analysis))
        .route(
            "/tools/custom-mhc-prediction",
            post(tools::custom_mhc_prediction),
        )
        .route("/tools/batch-screening", post(tools::batch_screening))
        .route("/tools/large-screening", post(tools::large_screening))
        .route(
            "/tools/multi-allele-screening",
            post(tools::multi_allele_screening),
        )
        // Add state and middleware
        .with_state(manager)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
