//! Docker-backed container runtime
//!
//! Drives the `docker` CLI through `tokio::process`. Argument construction is
//! kept in pure functions so it can be tested without a docker daemon.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ContainerRuntime, Operation, RuntimeError, WorkloadHandle};

/// Label attached to every container created by this runtime
pub const MANAGED_LABEL: &str = "io.kubelite.managed=true";

/// Container runtime that shells out to the docker CLI
#[derive(Debug, Clone)]
pub struct DockerCliRuntime {
    binary: String,
}

impl DockerCliRuntime {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use a specific docker-compatible binary (e.g. "podman")
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run one docker command, returning its stdout.
    ///
    /// The child is killed when the token fires or the future is dropped.
    async fn run(
        &self,
        operation: Operation,
        args: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<String, RuntimeError> {
        debug!("{} args: {:?}", self.binary, args);

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::NotAvailable(format!("'{}' not found in PATH", self.binary))
                } else {
                    RuntimeError::failed(operation, format!("failed to run {}: {}", self.binary, e))
                }
            })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output
                .map_err(|e| RuntimeError::failed(operation, e.to_string()))?,
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled(operation)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(operation, &args, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for DockerCliRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    fn name(&self) -> &str {
        "docker"
    }

    async fn pull(&self, image: &str, cancel: &CancellationToken) -> Result<(), RuntimeError> {
        self.run(Operation::Pull, generate_pull_args(image), cancel)
            .await
            .map(|_| ())
    }

    async fn create(
        &self,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<WorkloadHandle, RuntimeError> {
        let stdout = self
            .run(Operation::Create, generate_create_args(image), cancel)
            .await?;
        parse_container_id(&stdout)
    }

    async fn start(
        &self,
        handle: &WorkloadHandle,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        self.run(Operation::Start, generate_start_args(handle.as_str()), cancel)
            .await
            .map(|_| ())
    }

    async fn stop(
        &self,
        handle: &WorkloadHandle,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        self.run(Operation::Stop, generate_stop_args(handle.as_str()), cancel)
            .await
            .map(|_| ())
    }

    async fn remove(
        &self,
        handle: &WorkloadHandle,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        self.run(Operation::Remove, generate_rm_args(handle.as_str()), cancel)
            .await
            .map(|_| ())
    }
}

// ============================================================================
// SBIO: Pure argument construction and output parsing (no I/O)
// ============================================================================

/// Generate Docker pull arguments
pub fn generate_pull_args(image: &str) -> Vec<String> {
    vec!["pull".to_string(), image.to_string()]
}

/// Generate Docker create arguments
pub fn generate_create_args(image: &str) -> Vec<String> {
    vec![
        "create".to_string(),
        "--label".to_string(),
        MANAGED_LABEL.to_string(),
        image.to_string(),
    ]
}

/// Generate Docker start arguments
pub fn generate_start_args(container_id: &str) -> Vec<String> {
    vec!["start".to_string(), container_id.to_string()]
}

/// Generate Docker stop arguments
pub fn generate_stop_args(container_id: &str) -> Vec<String> {
    vec!["stop".to_string(), container_id.to_string()]
}

/// Generate Docker rm arguments
pub fn generate_rm_args(container_id: &str) -> Vec<String> {
    vec!["rm".to_string(), "-f".to_string(), container_id.to_string()]
}

/// Extract the container id printed by `docker create`.
///
/// Pull progress may precede the id when the image was missing, so the last
/// non-empty line wins.
pub fn parse_container_id(stdout: &str) -> Result<WorkloadHandle, RuntimeError> {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(WorkloadHandle::new)
        .ok_or_else(|| RuntimeError::failed(Operation::Create, "docker create printed no container id"))
}

/// Map a failed docker invocation onto a runtime error
pub fn classify_failure(operation: Operation, args: &[String], stderr: &str) -> RuntimeError {
    let target = args.last().cloned().unwrap_or_default();
    let lower = stderr.to_lowercase();

    if lower.contains("no such container") {
        return RuntimeError::ContainerNotFound(target);
    }
    if matches!(operation, Operation::Pull | Operation::Create)
        && (lower.contains("manifest unknown")
            || lower.contains("pull access denied")
            || lower.contains("repository does not exist"))
    {
        return RuntimeError::ImageNotFound(target);
    }
    if lower.contains("cannot connect to the docker daemon") {
        return RuntimeError::NotAvailable(stderr.to_string());
    }

    RuntimeError::failed(operation, stderr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_pull_args() {
        assert_eq!(generate_pull_args("nginx:1.27"), vec!["pull", "nginx:1.27"]);
    }

    #[test]
    fn test_generate_create_args() {
        let args = generate_create_args("redis");
        assert_eq!(args, vec!["create", "--label", MANAGED_LABEL, "redis"]);
    }

    #[test]
    fn test_generate_stop_args() {
        let args = generate_stop_args("my-container");
        assert_eq!(args, vec!["stop", "my-container"]);
    }

    #[test]
    fn test_generate_rm_args() {
        let args = generate_rm_args("my-container");
        assert_eq!(args, vec!["rm", "-f", "my-container"]);
    }

    #[test]
    fn test_parse_container_id() {
        let handle = parse_container_id("4f0c2d9a1b\n").unwrap();
        assert_eq!(handle.as_str(), "4f0c2d9a1b");
    }

    #[test]
    fn test_parse_container_id_after_pull_output() {
        let stdout = "latest: Pulling from library/nginx\nStatus: Downloaded\ne3b0c44298fc\n\n";
        let handle = parse_container_id(stdout).unwrap();
        assert_eq!(handle.as_str(), "e3b0c44298fc");
    }

    #[test]
    fn test_parse_container_id_empty() {
        assert!(parse_container_id("  \n").is_err());
    }

    #[test]
    fn test_classify_missing_container() {
        let args = generate_rm_args("abc");
        let err = classify_failure(
            Operation::Remove,
            &args,
            "Error response from daemon: No such container: abc",
        );
        assert_eq!(err, RuntimeError::ContainerNotFound("abc".to_string()));
    }

    #[test]
    fn test_classify_missing_image() {
        let args = generate_pull_args("nope/nothing");
        let err = classify_failure(
            Operation::Pull,
            &args,
            "Error response from daemon: pull access denied for nope/nothing",
        );
        assert_eq!(err, RuntimeError::ImageNotFound("nope/nothing".to_string()));
    }

    #[test]
    fn test_classify_other_failure() {
        let args = generate_start_args("abc");
        let err = classify_failure(Operation::Start, &args, "port is already allocated");
        assert!(matches!(err, RuntimeError::Failed { operation: Operation::Start, .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_reports_not_available() {
        let runtime = DockerCliRuntime::with_binary("kubelite-no-such-docker-binary");
        let err = runtime
            .pull("nginx", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NotAvailable(_)));
    }
}
