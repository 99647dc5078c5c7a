//! Prediction tool endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use netmhc_core::dto::job::SubmitResponse;
use netmhc_core::dto::tools::{
    AnalyzeOutputRequest, BatchScreeningRequest, BindingAffinityRequest, CustomMhcBindingRequest,
    CustomMhcPredictionRequest, LargeScreeningRequest, MultiAlleleScreeningRequest,
    OutputAnalysis, PeptideBindingRequest, PeptidePredictionRequest, ProteinAnalysisRequest,
    ProteinSequenceRequest, ServerInfo, ToolRun,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

impl OrchestratorClient {
    // Synchronous tools wait for the script to finish

    pub async fn predict_peptide_binding(&self, req: &PeptideBindingRequest) -> Result<ToolRun> {
        self.call_tool("predict-peptide-binding", req).await
    }

    pub async fn analyze_protein_sequence(
        &self,
        req: &ProteinSequenceRequest,
    ) -> Result<ToolRun> {
        self.call_tool("analyze-protein-sequence", req).await
    }

    pub async fn predict_custom_mhc_binding(
        &self,
        req: &CustomMhcBindingRequest,
    ) -> Result<ToolRun> {
        self.call_tool("predict-custom-mhc-binding", req).await
    }

    pub async fn predict_binding_affinity(&self, req: &BindingAffinityRequest) -> Result<ToolRun> {
        self.call_tool("predict-binding-affinity", req).await
    }

    pub async fn analyze_netmhcpan_output(
        &self,
        req: &AnalyzeOutputRequest,
    ) -> Result<OutputAnalysis> {
        self.call_tool("analyze-output", req).await
    }

    pub async fn submit_peptide_prediction(
        &self,
        req: &PeptidePredictionRequest,
    ) -> Result<SubmitResponse> {
        self.submit_tool("peptide-prediction", req).await
    }

    pub async fn submit_protein_analysis(
        &self,
        req: &ProteinAnalysisRequest,
    ) -> Result<SubmitResponse> {
        self.submit_tool("protein-analysis", req).await
    }

    pub async fn submit_custom_mhc_prediction(
        &self,
        req: &CustomMhcPredictionRequest,
    ) -> Result<SubmitResponse> {
        self.submit_tool("custom-mhc-prediction", req).await
    }

    pub async fn submit_batch_screening(
        &self,
        req: &BatchScreeningRequest,
    ) -> Result<SubmitResponse> {
        self.submit_tool("batch-screening", req).await
    }

    pub async fn submit_large_screening(
        &self,
        req: &LargeScreeningRequest,
    ) -> Result<SubmitResponse> {
        self.submit_tool("large-screening", req).await
    }

    pub async fn submit_multi_allele_screening(
        &self,
        req: &MultiAlleleScreeningRequest,
    ) -> Result<SubmitResponse> {
        self.submit_tool("multi-allele-screening", req).await
    }

    /// Server name, version, advertised tools and directories
    pub async fn server_info(&self) -> Result<ServerInfo> {
        let response = self.client.get(self.url("/info")).send().await?;
        self.handle_response(response).await
    }

    async fn submit_tool<T: Serialize>(&self, tool: &str, req: &T) -> Result<SubmitResponse> {
        self.call_tool(tool, req).await
    }

    async fn call_tool<T, R>(&self, tool: &str, req: &T) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(&format!("/tools/{}", tool)))
            .json(req)
            .send()
            .await?;

        self.handle_response(response).await
    }
}
