//! Cluster configuration
//!
//! Read from `~/.kubelite/config.yaml` unless a path is given. JSON files work
//! too since JSON is valid YAML.
//!
//! ```yaml
//! runtime: docker
//! callTimeoutSecs: 120
//! pullTimeoutSecs: 600
//! nodes:
//!   - name: node1
//!     capacity: 2
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cluster::{LifecycleConfig, NodeRegistry, API_PORT, DEFAULT_NODES};

/// Default config file location: ~/.kubelite/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kubelite")
        .join("config.yaml")
}

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Config must declare at least one node")]
    NoNodes,

    #[error("Node name must not be empty")]
    EmptyNodeName,

    #[error("Node '{0}' is declared more than once")]
    DuplicateNode(String),

    #[error("Node '{name}' has invalid capacity {capacity}: must be at least 1")]
    InvalidCapacity { name: String, capacity: u32 },

    #[error("{0} must be greater than zero")]
    InvalidTimeout(&'static str),
}

/// Which container runtime backs the cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// Shell out to the docker CLI
    #[default]
    Docker,
    /// In-memory containers, no engine required
    Simulated,
}

/// A node declared in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    pub capacity: u32,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

/// The complete configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default = "default_nodes")]
    pub nodes: Vec<NodeConfig>,

    #[serde(default)]
    pub runtime: RuntimeKind,

    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,

    /// Deadline for create/start/stop/remove
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Deadline for image pulls
    #[serde(default = "default_pull_timeout")]
    pub pull_timeout_secs: u64,

    #[serde(default = "default_bind_address")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            runtime: RuntimeKind::default(),
            docker_binary: default_docker_binary(),
            call_timeout_secs: default_call_timeout(),
            pull_timeout_secs: default_pull_timeout(),
            bind_addr: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_nodes() -> Vec<NodeConfig> {
    DEFAULT_NODES
        .iter()
        .map(|(name, capacity)| NodeConfig::new(*name, *capacity))
        .collect()
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_call_timeout() -> u64 {
    120
}

fn default_pull_timeout() -> u64 {
    600
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    API_PORT
}

impl ClusterConfig {
    /// Runtime deadlines derived from the configured seconds
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            pull_timeout: Duration::from_secs(self.pull_timeout_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }

    /// Build a node registry in declared order
    pub fn node_registry(&self) -> Result<NodeRegistry, ConfigError> {
        validate(self)?;
        NodeRegistry::with_nodes(self.nodes.iter().map(|n| (n.name.clone(), n.capacity)))
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn total_capacity(&self) -> u32 {
        self.nodes.iter().map(|n| n.capacity).sum()
    }
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Parse config from a YAML string; empty content yields the defaults
pub fn parse_config(content: &str) -> Result<ClusterConfig, ConfigError> {
    if content.trim().is_empty() {
        return Ok(ClusterConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Check the structural rules a usable cluster config must satisfy
pub fn validate(config: &ClusterConfig) -> Result<(), ConfigError> {
    if config.nodes.is_empty() {
        return Err(ConfigError::NoNodes);
    }

    let mut seen = HashSet::new();
    for node in &config.nodes {
        if node.name.trim().is_empty() {
            return Err(ConfigError::EmptyNodeName);
        }
        if node.capacity == 0 {
            return Err(ConfigError::InvalidCapacity {
                name: node.name.clone(),
                capacity: node.capacity,
            });
        }
        if !seen.insert(node.name.as_str()) {
            return Err(ConfigError::DuplicateNode(node.name.clone()));
        }
    }

    if config.call_timeout_secs == 0 {
        return Err(ConfigError::InvalidTimeout("callTimeoutSecs"));
    }
    if config.pull_timeout_secs == 0 {
        return Err(ConfigError::InvalidTimeout("pullTimeoutSecs"));
    }
    Ok(())
}

// ============================================================================
// I/O boundary functions
// ============================================================================

/// Load and validate a config file that must exist
pub fn load_config_file(path: &Path) -> Result<ClusterConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Load an explicit path, or the default location falling back to defaults
pub fn load_or_default(path: Option<&Path>) -> Result<ClusterConfig, ConfigError> {
    match path {
        Some(path) => load_config_file(path),
        None => {
            let path = default_config_path();
            if path.exists() {
                load_config_file(&path)
            } else {
                Ok(ClusterConfig::default())
            }
        }
    }
}
