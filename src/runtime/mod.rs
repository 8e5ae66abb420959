//! Container runtime client
//!
//! The scheduler never talks to a container engine directly. Everything it
//! needs (pull, create, start, stop, remove) goes through the
//! [`ContainerRuntime`] trait so the engine can be swapped for the docker CLI,
//! an in-memory simulation, or a test double.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod docker;
pub mod simulated;

pub use docker::DockerCliRuntime;
pub use simulated::{ContainerState, SimulatedRuntime};

/// A runtime operation, used for error reporting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Pull,
    Create,
    Start,
    Stop,
    Remove,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Pull => "pull",
            Operation::Create => "create",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// Errors reported by a container runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Runtime not available: {0}")]
    NotAvailable(String),

    #[error("Image '{0}' not found")]
    ImageNotFound(String),

    #[error("Container '{0}' not found")]
    ContainerNotFound(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: Operation,
        timeout: Duration,
    },

    #[error("{0} cancelled")]
    Cancelled(Operation),

    #[error("{operation} failed: {message}")]
    Failed {
        operation: Operation,
        message: String,
    },
}

impl RuntimeError {
    pub fn failed(operation: Operation, message: impl Into<String>) -> Self {
        RuntimeError::Failed {
            operation,
            message: message.into(),
        }
    }
}

/// Identifier the runtime assigns to a created container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadHandle(String);

impl WorkloadHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkloadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WorkloadHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Narrow client capability over a container engine.
///
/// Every call receives a cancellation token. Implementations must stop
/// waiting and return [`RuntimeError::Cancelled`] once it fires; the caller
/// uses it to enforce per-call deadlines and process shutdown.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Short name for logs and status output
    fn name(&self) -> &str;

    async fn pull(&self, image: &str, cancel: &CancellationToken) -> Result<(), RuntimeError>;

    async fn create(
        &self,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<WorkloadHandle, RuntimeError>;

    async fn start(
        &self,
        handle: &WorkloadHandle,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError>;

    async fn stop(
        &self,
        handle: &WorkloadHandle,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError>;

    async fn remove(
        &self,
        handle: &WorkloadHandle,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError>;
}

/// Runtime shared between the lifecycle manager and request handlers
pub type SharedRuntime = Arc<dyn ContainerRuntime>;
