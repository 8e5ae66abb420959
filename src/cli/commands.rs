//! Command implementations for the CLI
//!
//! SBIO pattern: Commands return Results, I/O is handled by caller

use std::path::Path;

use thiserror::Error;

use crate::cluster::{Node, Pod, PodSpec};
use crate::config::{self, ClusterConfig};

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server error ({kind}): {message}")]
    Server { kind: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;

// ============================================================================
// Validate Commands
// ============================================================================

/// Result of validating a config file
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub config: Option<ClusterConfig>,
    pub error: Option<String>,
}

/// Validate a config file; an unreadable or invalid file is reported, not raised
pub fn validate_config(path: &Path) -> ValidationResult {
    match config::load_config_file(path) {
        Ok(config) => ValidationResult {
            valid: true,
            config: Some(config),
            error: None,
        },
        Err(e) => ValidationResult {
            valid: false,
            config: None,
            error: Some(e.to_string()),
        },
    }
}

// ============================================================================
// HTTP Client for the API server
// ============================================================================

/// Client for communicating with a running `kubelite serve`
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn build_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url)
    }

    /// Turn a non-success response into a `CommandError` using the error body
    async fn check(resp: reqwest::Response) -> CommandResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        let message = body["error"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CommandError::NotFound(message));
        }
        let kind = body["kind"].as_str().unwrap_or("Unknown").to_string();
        Err(CommandError::Server { kind, message })
    }

    /// Get cluster status
    pub async fn status(&self) -> CommandResult<serde_json::Value> {
        let resp = self
            .build_request(reqwest::Method::GET, "/v1/status")
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Create a pod
    pub async fn create_pod(&self, spec: &PodSpec) -> CommandResult<Pod> {
        let resp = self
            .build_request(reqwest::Method::POST, "/v1/pods")
            .json(spec)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// List pods
    pub async fn list_pods(&self) -> CommandResult<Vec<Pod>> {
        let resp = self
            .build_request(reqwest::Method::GET, "/v1/pods")
            .send()
            .await?;
        let body: serde_json::Value = Self::check(resp).await?.json().await?;
        Ok(serde_json::from_value(body["items"].clone())?)
    }

    /// Get a specific pod
    pub async fn get_pod(&self, id: &str) -> CommandResult<Pod> {
        let resp = self
            .build_request(reqwest::Method::GET, &format!("/v1/pods/{}", id))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Delete a pod
    pub async fn delete_pod(&self, id: &str) -> CommandResult<()> {
        let resp = self
            .build_request(reqwest::Method::DELETE, &format!("/v1/pods/{}", id))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// List nodes
    pub async fn list_nodes(&self) -> CommandResult<Vec<Node>> {
        let resp = self
            .build_request(reqwest::Method::GET, "/v1/nodes")
            .send()
            .await?;
        let body: serde_json::Value = Self::check(resp).await?.json().await?;
        Ok(serde_json::from_value(body["items"].clone())?)
    }
}
