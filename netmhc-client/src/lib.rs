//! NetMHCIIpan orchestrator HTTP client
//!
//! A small, typed HTTP client for the job orchestrator API, used by the
//! `netmhc` command line and by anything else that wants to submit prediction
//! jobs remotely.
//!
//! # Example
//!
//! ```no_run
//! use netmhc_client::OrchestratorClient;
//! use netmhc_core::dto::tools::PeptidePredictionRequest;
//!
//! # async fn example() -> netmhc_client::Result<()> {
//! let client = OrchestratorClient::new("http://localhost:8080");
//!
//! let submitted = client
//!     .submit_peptide_prediction(&PeptidePredictionRequest {
//!         peptides: Some("PKYVKQNTLKLAT".to_string()),
//!         allele: "DRB1_0101".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! println!("Submitted job: {}", submitted.job_id);
//! # Ok(())
//! # }
//! ```

pub mod error;
mod jobs;
mod tools;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the orchestrator API
///
/// Methods are grouped into:
/// - Job management (submit, status, result, log, cancel, list, export)
/// - Prediction tools (one submit call per bundled script)
/// - Server info
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Example
    /// ```
    /// use netmhc_client::OrchestratorClient;
    ///
    /// let client = OrchestratorClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// Non-success statuses become [`ClientError::ApiError`] carrying the
    /// server's error message.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!("Orchestrator returned {}: {}", status, error_text);
            return Err(ClientError::from_body(status.as_u16(), &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
