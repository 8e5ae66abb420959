//! Pod lifecycle manager - sequences runtime calls with registry mutations
//!
//! The manager owns the node and pod registries and is the only component
//! that mutates them. Its job is to keep the recorded state in step with the
//! container runtime, even when a step fails partway through or requests race:
//!
//! ```text
//! Pending --(reserve+pull+create+start)--> Running --(delete)--> Deleting
//!    |                                                             |
//!    +-- any failure: roll back, never recorded        stop+remove ok: Deleted (evicted)
//!                                                       remove fails:  Failed (capacity held)
//! ```
//!
//! No registry lock is held across a runtime call. Capacity is reserved
//! before the pull begins and released only after a confirmed rollback or a
//! completed delete, so node usage always counts in-flight work.
//!
//! `create` and `delete` run on their own task. A caller that stops waiting
//! (a dropped HTTP connection, an outer timeout) abandons the result, not
//! the operation, so a half-finished sequence never strands a reservation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::node::{Node, NodeError, NodeRegistry};
use super::pod::{Pod, PodPhase, PodRegistry, PodSpec};
use super::scheduler::{RoundRobinScheduler, SchedulerError};
use crate::runtime::{Operation, RuntimeError, SharedRuntime, WorkloadHandle};

/// Errors surfaced by lifecycle operations
#[derive(Error, Debug)]
pub enum PodError {
    #[error("Invalid pod spec: {0}")]
    InvalidSpec(String),

    #[error("No capacity available on any of {nodes} node(s)")]
    NoCapacityAvailable { nodes: usize },

    #[error("Failed to pull image '{image}': {source}")]
    ImagePullFailed {
        image: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to create container from image '{image}': {source}")]
    ContainerCreateFailed {
        image: String,
        #[source]
        source: RuntimeError,
    },

    #[error(
        "Failed to start container {handle} on node '{node}': {source}{}",
        rollback_note(.rollback)
    )]
    ContainerStartFailed {
        handle: WorkloadHandle,
        node: String,
        #[source]
        source: RuntimeError,
        /// Set when removing the unstarted container also failed; the
        /// reservation is then held by a `Failed` pod record
        rollback: Option<RuntimeError>,
    },

    #[error("Pod '{0}' not found")]
    NotFound(String),

    #[error("Failed to delete pod '{id}': {}remove: {remove}", stop_note(.stop))]
    DeleteFailed {
        id: String,
        stop: Option<RuntimeError>,
        remove: RuntimeError,
    },

    /// The lifecycle task was torn down before it reported back
    #[error("Pod {operation} interrupted: {reason}")]
    Interrupted {
        operation: &'static str,
        reason: String,
    },
}

fn rollback_note(rollback: &Option<RuntimeError>) -> String {
    match rollback {
        Some(cause) => format!(
            " (rollback removal also failed: {}; reservation leaked)",
            cause
        ),
        None => String::new(),
    }
}

fn stop_note(stop: &Option<RuntimeError>) -> String {
    match stop {
        Some(cause) => format!("stop: {}; ", cause),
        None => String::new(),
    }
}

impl PodError {
    /// Stable name of the error kind, used by the HTTP adapter
    pub fn kind(&self) -> &'static str {
        match self {
            PodError::InvalidSpec(_) => "InvalidSpec",
            PodError::NoCapacityAvailable { .. } => "NoCapacityAvailable",
            PodError::ImagePullFailed { .. } => "ImagePullFailed",
            PodError::ContainerCreateFailed { .. } => "ContainerCreateFailed",
            PodError::ContainerStartFailed { .. } => "ContainerStartFailed",
            PodError::NotFound(_) => "NotFound",
            PodError::DeleteFailed { .. } => "DeleteFailed",
            PodError::Interrupted { .. } => "Interrupted",
        }
    }

    /// True when the failure left a reservation held that needs an operator
    pub fn leaks_capacity(&self) -> bool {
        matches!(
            self,
            PodError::ContainerStartFailed {
                rollback: Some(_),
                ..
            } | PodError::DeleteFailed { .. }
        )
    }

    /// True when the failure left no trace in either registry
    pub fn is_clean(&self) -> bool {
        !self.leaks_capacity()
    }
}

impl From<SchedulerError> for PodError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::NoCapacityAvailable { nodes } => PodError::NoCapacityAvailable { nodes },
        }
    }
}

/// Deadlines applied to runtime calls
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Deadline for image pulls
    pub pull_timeout: Duration,

    /// Deadline for create, start, stop and remove
    pub call_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            pull_timeout: Duration::from_secs(600),
            call_timeout: Duration::from_secs(120),
        }
    }
}

/// Cluster-wide counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub nodes: usize,
    pub capacity: u32,
    pub used: u32,
    pub leaked: u32,
    pub pods: usize,
    pub running: usize,
    pub deleting: usize,
    pub failed: usize,
}

/// Orchestrates pod create/delete against the runtime and both registries
pub struct PodManager {
    nodes: NodeRegistry,
    pods: PodRegistry,
    scheduler: RoundRobinScheduler,
    runtime: SharedRuntime,
    config: LifecycleConfig,
    shutdown: CancellationToken,
}

impl PodManager {
    pub fn new(nodes: NodeRegistry, runtime: SharedRuntime, config: LifecycleConfig) -> Self {
        Self {
            nodes,
            pods: PodRegistry::new(),
            scheduler: RoundRobinScheduler::new(),
            runtime,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Schedule a pod and bring its container up.
    ///
    /// On any failure before the container is running the reservation is
    /// released and no record is kept. The one exception is a start failure
    /// whose cleanup removal also fails: the container may still exist, so
    /// its reservation stays held by a `Failed` record the operator can delete.
    ///
    /// The sequence runs to completion even if the returned future is dropped.
    pub async fn create(self: &Arc<Self>, spec: PodSpec) -> Result<Pod, PodError> {
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move { manager.run_create(spec).await });
        join_lifecycle("create", task).await
    }

    async fn run_create(&self, spec: PodSpec) -> Result<Pod, PodError> {
        let spec = PodSpec::new(spec.name.trim(), spec.image.trim());
        if spec.image.is_empty() {
            return Err(PodError::InvalidSpec("image must not be empty".to_string()));
        }
        debug!(pod = %spec.name, image = %spec.image, "Pod {:?}", PodPhase::Pending);

        let node = self.scheduler.select_node(&self.nodes).inspect_err(|e| {
            warn!(pod = %spec.name, "Cannot schedule pod: {}", e);
        })?;
        info!(pod = %spec.name, node = %node, "Pod {:?}", PodPhase::Scheduled);

        let image = spec.image.as_str();
        let runtime = &self.runtime;

        if let Err(source) = self
            .runtime_call(Operation::Pull, self.config.pull_timeout, |cancel| async move {
                runtime.pull(image, &cancel).await
            })
            .await
        {
            warn!(pod = %spec.name, node = %node, "Image pull failed, releasing reservation: {}", source);
            self.release_reservation(&node);
            return Err(PodError::ImagePullFailed {
                image: spec.image,
                source,
            });
        }

        let handle = match self
            .runtime_call(Operation::Create, self.config.call_timeout, |cancel| async move {
                runtime.create(image, &cancel).await
            })
            .await
        {
            Ok(handle) => handle,
            Err(source) => {
                warn!(pod = %spec.name, node = %node, "Container create failed, releasing reservation: {}", source);
                self.release_reservation(&node);
                return Err(PodError::ContainerCreateFailed {
                    image: spec.image,
                    source,
                });
            }
        };

        let started = self
            .runtime_call(Operation::Start, self.config.call_timeout, |cancel| {
                let handle = &handle;
                async move { runtime.start(handle, &cancel).await }
            })
            .await;
        if let Err(source) = started {
            return Err(self.roll_back_start(&spec, &node, handle, source).await);
        }

        let pod = Pod::running(&handle, &spec, &node);
        if let Err(rejected) = self.pods.insert(pod.clone()) {
            // The runtime handed out an id that is already bound to another pod.
            // Leave that pod's binding alone and give this reservation back.
            error!(pod = %rejected.name, id = %rejected.id, "Workload id already bound, refusing to record pod");
            self.release_reservation(&node);
            return Err(PodError::ContainerCreateFailed {
                image: spec.image,
                source: RuntimeError::failed(
                    Operation::Create,
                    format!("workload id {} is already bound", rejected.id),
                ),
            });
        }

        info!(pod = %pod.name, id = %pod.id, node = %node, "Pod {:?}", PodPhase::Running);
        Ok(pod)
    }

    /// Undo a create whose start step failed
    async fn roll_back_start(
        &self,
        spec: &PodSpec,
        node: &str,
        handle: WorkloadHandle,
        source: RuntimeError,
    ) -> PodError {
        warn!(pod = %spec.name, id = %handle, "Container start failed, removing it: {}", source);

        let runtime = &self.runtime;
        let removal = self
            .runtime_call(Operation::Remove, self.config.call_timeout, |cancel| {
                let handle = &handle;
                async move { runtime.remove(handle, &cancel).await }
            })
            .await;

        let rollback = match removal {
            Ok(()) | Err(RuntimeError::ContainerNotFound(_)) => {
                self.release_reservation(node);
                None
            }
            Err(cause) => {
                error!(
                    pod = %spec.name,
                    id = %handle,
                    node = %node,
                    "Rollback removal failed, reservation leaked: {}",
                    cause
                );
                let message = format!(
                    "start failed: {}; rollback removal failed: {}",
                    source, cause
                );
                let pod = Pod::running(&handle, spec, node).with_failure(message);
                match self.pods.insert(pod) {
                    Ok(()) => self.mark_leaked(node),
                    Err(rejected) => {
                        error!(id = %rejected.id, "Workload id already bound, leaked reservation is untracked");
                        self.mark_leaked(node);
                    }
                }
                Some(cause)
            }
        };

        PodError::ContainerStartFailed {
            handle,
            node: node.to_string(),
            source,
            rollback,
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Stop and remove a pod's container, then release its node.
    ///
    /// A stop failure is tolerated as long as removal succeeds. If removal
    /// fails the pod is left `Failed` with its reservation held; calling
    /// `delete` again retries stop/remove against the same container.
    ///
    /// Like `create`, the sequence is detached from the caller, so a pod never
    /// stays `Deleting` because nobody waited for the result.
    pub async fn delete(self: &Arc<Self>, id: &str) -> Result<(), PodError> {
        let manager = Arc::clone(self);
        let id = id.to_string();
        let task = tokio::spawn(async move { manager.run_delete(&id).await });
        join_lifecycle("delete", task).await
    }

    async fn run_delete(&self, id: &str) -> Result<(), PodError> {
        let pod = self
            .pods
            .begin_delete(id)
            .ok_or_else(|| PodError::NotFound(id.to_string()))?;
        let was_failed = pod.state == PodPhase::Failed;
        let node = pod.node_name.clone().unwrap_or_default();
        info!(pod = %pod.name, id = %id, node = %node, "Pod {:?}", PodPhase::Deleting);

        let handle = pod.handle();
        let runtime = &self.runtime;

        let stop = match self
            .runtime_call(Operation::Stop, self.config.call_timeout, |cancel| {
                let handle = &handle;
                async move { runtime.stop(handle, &cancel).await }
            })
            .await
        {
            Ok(()) => None,
            Err(cause) => {
                warn!(id = %id, "Stop failed, attempting removal anyway: {}", cause);
                Some(cause)
            }
        };

        let removal = self
            .runtime_call(Operation::Remove, self.config.call_timeout, |cancel| {
                let handle = &handle;
                async move { runtime.remove(handle, &cancel).await }
            })
            .await;

        match removal {
            Ok(()) => {}
            Err(RuntimeError::ContainerNotFound(_)) => {
                debug!(id = %id, "Container already gone");
            }
            Err(remove) => {
                let err = PodError::DeleteFailed {
                    id: id.to_string(),
                    stop,
                    remove,
                };
                error!(id = %id, node = %node, "Pod {:?}: {}", PodPhase::Failed, err);
                self.pods.mark_failed(id, err.to_string());
                if !was_failed && pod.is_bound() {
                    self.mark_leaked(&node);
                }
                return Err(err);
            }
        }

        if pod.is_bound() {
            self.release_reservation(&node);
            if was_failed {
                if let Err(e) = self.nodes.clear_leaked(&node) {
                    warn!("Could not clear leaked reservation on {}: {}", node, e);
                }
            }
        }
        self.pods.delete(id);
        info!(pod = %pod.name, id = %id, node = %node, "Pod {:?}", PodPhase::Deleted);
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_pod(&self, id: &str) -> Option<Pod> {
        self.pods.get(id)
    }

    pub fn list_pods(&self) -> Vec<Pod> {
        self.pods.list()
    }

    pub fn list_nodes(&self) -> Vec<Node> {
        self.nodes.snapshot()
    }

    pub fn get_node(&self, name: &str) -> Option<Node> {
        self.nodes.get(name)
    }

    pub fn register_node(&self, name: impl Into<String>, capacity: u32) -> Result<(), NodeError> {
        self.nodes.register(name, capacity)
    }

    pub fn unregister_node(&self, name: &str) -> Result<Node, NodeError> {
        self.nodes.unregister(name)
    }

    /// Pods on `node` counted toward its live usage
    pub fn active_pods_on(&self, node: &str) -> usize {
        self.pods.count_on_node(node, PodPhase::is_active)
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    pub fn stats(&self) -> ClusterStats {
        let nodes = self.nodes.snapshot();
        let pods = self.pods.list();
        let count = |phase: PodPhase| pods.iter().filter(|p| p.state == phase).count();

        ClusterStats {
            nodes: nodes.len(),
            capacity: nodes.iter().map(|n| n.capacity).sum(),
            used: nodes.iter().map(|n| n.used).sum(),
            leaked: nodes.iter().map(|n| n.leaked).sum(),
            pods: pods.len(),
            running: count(PodPhase::Running),
            deleting: count(PodPhase::Deleting),
            failed: count(PodPhase::Failed),
        }
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Abort in-flight runtime calls; each is handled as that step's failure
    pub fn shutdown(&self) {
        info!("Cancelling in-flight runtime calls");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Run one runtime call under a deadline.
    ///
    /// Each call gets a child of the shutdown token; it is cancelled when the
    /// deadline passes so the runtime can abandon the work.
    async fn runtime_call<T, F, Fut>(
        &self,
        operation: Operation,
        timeout: Duration,
        call: F,
    ) -> Result<T, RuntimeError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, RuntimeError>>,
    {
        let cancel = self.shutdown.child_token();
        match tokio::time::timeout(timeout, call(cancel.clone())).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(RuntimeError::Timeout { operation, timeout })
            }
        }
    }

    fn release_reservation(&self, node: &str) {
        if let Err(e) = self.nodes.release(node) {
            error!("Failed to release reservation on {}: {}", node, e);
        }
    }

    fn mark_leaked(&self, node: &str) {
        if let Err(e) = self.nodes.mark_leaked(node) {
            error!("Failed to record leaked reservation on {}: {}", node, e);
        }
    }
}

/// Wait for a detached lifecycle task, re-raising its panic if it had one
async fn join_lifecycle<T>(
    operation: &'static str,
    task: JoinHandle<Result<T, PodError>>,
) -> Result<T, PodError> {
    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            error!("Pod {} task did not finish: {}", operation, e);
            Err(PodError::Interrupted {
                operation,
                reason: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerState, SimulatedRuntime};
    use std::sync::Arc;

    fn manager_with(nodes: &[(&str, u32)]) -> (Arc<PodManager>, Arc<SimulatedRuntime>) {
        let runtime = Arc::new(SimulatedRuntime::new());
        let registry = NodeRegistry::with_nodes(nodes.iter().map(|(n, c)| (*n, *c))).unwrap();
        let manager = PodManager::new(registry, runtime.clone(), LifecycleConfig::default());
        (Arc::new(manager), runtime)
    }

    fn used(manager: &PodManager, node: &str) -> u32 {
        manager.get_node(node).unwrap().used
    }

    #[tokio::test]
    async fn test_create_runs_pod() {
        let (manager, runtime) = manager_with(&[("node1", 2)]);

        let pod = manager.create(PodSpec::new("web", "nginx")).await.unwrap();

        assert_eq!(pod.state, PodPhase::Running);
        assert_eq!(pod.node_name.as_deref(), Some("node1"));
        assert_eq!(used(&manager, "node1"), 1);
        assert_eq!(
            runtime.container_state(&pod.handle()),
            Some(ContainerState::Running)
        );
        assert_eq!(manager.get_pod(&pod.id), Some(pod));
    }

    #[tokio::test]
    async fn test_empty_image_is_invalid() {
        let (manager, runtime) = manager_with(&[("node1", 1)]);

        let err = manager.create(PodSpec::new("web", "   ")).await.unwrap_err();

        assert!(matches!(err, PodError::InvalidSpec(_)));
        assert_eq!(used(&manager, "node1"), 0);
        assert_eq!(runtime.call_count(Operation::Pull), 0);
    }

    #[tokio::test]
    async fn test_no_capacity_skips_runtime() {
        let (manager, runtime) = manager_with(&[("node1", 1)]);
        manager.create(PodSpec::new("a", "x")).await.unwrap();

        let err = manager.create(PodSpec::new("b", "y")).await.unwrap_err();

        assert!(matches!(err, PodError::NoCapacityAvailable { nodes: 1 }));
        assert_eq!(runtime.call_count(Operation::Pull), 1);
    }

    #[tokio::test]
    async fn test_pull_failure_releases_reservation() {
        let (manager, runtime) = manager_with(&[("node1", 1)]);
        runtime.fail(Operation::Pull);

        let err = manager.create(PodSpec::new("web", "nginx")).await.unwrap_err();

        assert!(matches!(err, PodError::ImagePullFailed { .. }));
        assert!(err.is_clean());
        assert_eq!(used(&manager, "node1"), 0);
        assert_eq!(runtime.call_count(Operation::Create), 0);
        assert!(manager.list_pods().is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_releases_reservation() {
        let (manager, runtime) = manager_with(&[("node1", 1)]);
        runtime.fail(Operation::Create);

        let err = manager.create(PodSpec::new("web", "nginx")).await.unwrap_err();

        assert!(matches!(err, PodError::ContainerCreateFailed { .. }));
        assert_eq!(used(&manager, "node1"), 0);
        assert_eq!(runtime.call_count(Operation::Start), 0);
    }

    #[tokio::test]
    async fn test_start_failure_removes_container() {
        let (manager, runtime) = manager_with(&[("node1", 1)]);
        runtime.fail(Operation::Start);

        let err = manager.create(PodSpec::new("web", "nginx")).await.unwrap_err();

        match &err {
            PodError::ContainerStartFailed { rollback, .. } => assert!(rollback.is_none()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_clean());
        assert_eq!(used(&manager, "node1"), 0);
        assert_eq!(runtime.container_count(), 0);
        assert!(manager.list_pods().is_empty());
    }

    #[tokio::test]
    async fn test_start_failure_with_failed_rollback_is_visible() {
        let (manager, runtime) = manager_with(&[("node1", 2)]);
        runtime.fail(Operation::Start);
        runtime.fail_once(Operation::Remove);

        let err = manager.create(PodSpec::new("web", "nginx")).await.unwrap_err();

        assert!(err.leaks_capacity());
        assert!(err.to_string().contains("reservation leaked"));
        let node = manager.get_node("node1").unwrap();
        assert_eq!(node.used, 1);
        assert_eq!(node.leaked, 1);

        let pods = manager.list_pods();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].state, PodPhase::Failed);

        // The operator cleans up by deleting the failed pod
        manager.delete(&pods[0].id).await.unwrap();
        let node = manager.get_node("node1").unwrap();
        assert_eq!((node.used, node.leaked), (0, 0));
        assert_eq!(runtime.container_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_releases_exactly_one_unit() {
        let (manager, runtime) = manager_with(&[("node1", 3)]);
        let a = manager.create(PodSpec::new("a", "x")).await.unwrap();
        manager.create(PodSpec::new("b", "x")).await.unwrap();
        assert_eq!(used(&manager, "node1"), 2);

        manager.delete(&a.id).await.unwrap();

        assert_eq!(used(&manager, "node1"), 1);
        assert!(manager.get_pod(&a.id).is_none());
        assert_eq!(runtime.container_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_pod() {
        let (manager, _runtime) = manager_with(&[("node1", 1)]);
        manager.create(PodSpec::new("a", "x")).await.unwrap();
        let before = manager.list_nodes();

        let err = manager.delete("nope").await.unwrap_err();

        assert!(matches!(err, PodError::NotFound(_)));
        assert_eq!(manager.list_nodes(), before);
        assert_eq!(manager.list_pods().len(), 1);
    }

    #[tokio::test]
    async fn test_second_delete_is_not_found() {
        let (manager, _runtime) = manager_with(&[("node1", 1)]);
        let pod = manager.create(PodSpec::new("a", "x")).await.unwrap();

        manager.delete(&pod.id).await.unwrap();
        assert!(matches!(manager.delete(&pod.id).await, Err(PodError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stop_failure_still_removes() {
        let (manager, runtime) = manager_with(&[("node1", 1)]);
        let pod = manager.create(PodSpec::new("a", "x")).await.unwrap();
        runtime.fail(Operation::Stop);

        manager.delete(&pod.id).await.unwrap();

        assert_eq!(used(&manager, "node1"), 0);
        assert_eq!(runtime.container_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_failure_leaves_failed_pod_holding_capacity() {
        let (manager, runtime) = manager_with(&[("node1", 1)]);
        let pod = manager.create(PodSpec::new("a", "x")).await.unwrap();
        runtime.fail(Operation::Stop);
        runtime.fail(Operation::Remove);

        let err = manager.delete(&pod.id).await.unwrap_err();

        match &err {
            PodError::DeleteFailed { stop, .. } => assert!(stop.is_some()),
            other => panic!("unexpected error: {other}"),
        }
        let failed = manager.get_pod(&pod.id).unwrap();
        assert_eq!(failed.state, PodPhase::Failed);
        assert!(failed.message.is_some());
        let node = manager.get_node("node1").unwrap();
        assert_eq!((node.used, node.leaked), (1, 1));

        // No automatic retry happened
        assert_eq!(runtime.call_count(Operation::Remove), 1);

        // A caller retry re-attempts against the same container
        runtime.clear_failures();
        manager.delete(&pod.id).await.unwrap();
        let node = manager.get_node("node1").unwrap();
        assert_eq!((node.used, node.leaked), (0, 0));
        assert!(manager.list_pods().is_empty());
    }

    #[tokio::test]
    async fn test_pull_timeout_rolls_back() {
        let runtime = Arc::new(SimulatedRuntime::new().with_latency(Duration::from_millis(200)));
        let registry = NodeRegistry::with_nodes([("node1", 1)]).unwrap();
        let config = LifecycleConfig {
            pull_timeout: Duration::from_millis(20),
            call_timeout: Duration::from_secs(5),
        };
        let manager = Arc::new(PodManager::new(registry, runtime.clone(), config));

        let err = manager.create(PodSpec::new("a", "x")).await.unwrap_err();

        match err {
            PodError::ImagePullFailed { source, .. } => assert!(matches!(
                source,
                RuntimeError::Timeout {
                    operation: Operation::Pull,
                    ..
                }
            )),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(used(&manager, "node1"), 0);
        assert!(!runtime.is_pulled("x"));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_runtime_calls() {
        let (manager, runtime) = manager_with(&[("node1", 1)]);
        manager.shutdown();

        let err = manager.create(PodSpec::new("a", "x")).await.unwrap_err();

        assert!(manager.is_shut_down());
        assert!(matches!(
            err,
            PodError::ImagePullFailed {
                source: RuntimeError::Cancelled(Operation::Pull),
                ..
            }
        ));
        assert_eq!(used(&manager, "node1"), 0);
        assert_eq!(runtime.container_count(), 0);
    }

    #[tokio::test]
    async fn test_stats() {
        let (manager, _runtime) = manager_with(&[("node1", 2), ("node2", 2)]);
        manager.create(PodSpec::new("a", "x")).await.unwrap();
        manager.create(PodSpec::new("b", "x")).await.unwrap();

        let stats = manager.stats();
        assert_eq!(stats.nodes, 2);
        assert_eq!(stats.capacity, 4);
        assert_eq!(stats.used, 2);
        assert_eq!(stats.running, 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_error_kinds() {
        assert_eq!(PodError::NotFound("x".into()).kind(), "NotFound");
        let interrupted = PodError::Interrupted {
            operation: "create",
            reason: "runtime shutting down".into(),
        };
        assert_eq!(interrupted.kind(), "Interrupted");
        assert!(interrupted.is_clean());
        assert_eq!(
            PodError::from(SchedulerError::NoCapacityAvailable { nodes: 3 }).kind(),
            "NoCapacityAvailable"
        );
    }
}
