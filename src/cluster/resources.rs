//! Envelope types shared by the HTTP API and the CLI client

use serde::{Deserialize, Serialize};

/// API version stamped on list responses
pub const API_VERSION: &str = "kubelite/v1";

/// Response for listing resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceList<T> {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Kind (e.g., "PodList", "NodeList")
    pub kind: String,

    pub items: Vec<T>,
}

impl<T> ResourceList<T> {
    pub fn new(kind: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: kind.into(),
            items,
        }
    }
}

/// Outcome of a mutating request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationStatus {
    pub success: bool,

    pub message: String,
}

impl OperationStatus {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
