//! Configuration module
//!
//! Handles CLI configuration including the orchestrator URL.

use netmhc_client::OrchestratorClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
}

impl Config {
    pub fn client(&self) -> OrchestratorClient {
        OrchestratorClient::new(&self.orchestrator_url)
    }
}
