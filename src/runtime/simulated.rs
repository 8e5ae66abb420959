//! In-memory container runtime
//!
//! Keeps a table of simulated containers instead of talking to an engine.
//! Serves the `simulated` runtime mode and every test that needs a runtime:
//! failures can be injected per operation (optionally scoped to one image),
//! and an artificial latency makes races and deadlines observable.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{ContainerRuntime, Operation, RuntimeError, WorkloadHandle};

/// State of a simulated container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Stopped,
}

#[derive(Debug, Clone)]
struct SimulatedContainer {
    image: String,
    state: ContainerState,
}

/// A failure armed for upcoming calls
#[derive(Debug, Clone)]
struct InjectedFailure {
    operation: Operation,
    /// Only calls touching this image fail
    image: Option<String>,
    /// Calls left to fail; `None` fails forever
    remaining: Option<usize>,
}

/// Container runtime backed by in-memory tables
#[derive(Debug, Default)]
pub struct SimulatedRuntime {
    containers: DashMap<WorkloadHandle, SimulatedContainer>,
    images: DashSet<String>,
    calls: DashMap<Operation, usize>,
    failures: Mutex<Vec<InjectedFailure>>,
    latency: Duration,
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail every future call of `operation`
    pub fn fail(&self, operation: Operation) {
        self.inject(operation, None, None);
    }

    /// Fail only the next call of `operation`
    pub fn fail_once(&self, operation: Operation) {
        self.inject(operation, None, Some(1));
    }

    /// Fail every future call of `operation` that touches `image`
    pub fn fail_for_image(&self, operation: Operation, image: impl Into<String>) {
        self.inject(operation, Some(image.into()), None);
    }

    /// Disarm all injected failures
    pub fn clear_failures(&self) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn inject(&self, operation: Operation, image: Option<String>, remaining: Option<usize>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(InjectedFailure {
                operation,
                image,
                remaining,
            });
    }

    /// Number of calls made for `operation`, successful or not
    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls.get(&operation).map(|c| *c).unwrap_or(0)
    }

    pub fn container_state(&self, handle: &WorkloadHandle) -> Option<ContainerState> {
        self.containers.get(handle).map(|c| c.state)
    }

    /// Number of containers that exist in any state
    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn running_count(&self) -> usize {
        self.containers
            .iter()
            .filter(|c| c.state == ContainerState::Running)
            .count()
    }

    pub fn is_pulled(&self, image: &str) -> bool {
        self.images.contains(image)
    }

    /// Record the call, wait out the latency, then apply injected failures
    async fn enter(
        &self,
        operation: Operation,
        image: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        *self.calls.entry(operation).or_insert(0) += 1;

        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled(operation));
        }
        if !self.latency.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.latency) => {}
                _ = cancel.cancelled() => return Err(RuntimeError::Cancelled(operation)),
            }
        }

        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let armed = failures.iter().position(|f| {
            f.operation == operation
                && f.image.as_deref().map_or(true, |wanted| Some(wanted) == image)
        });
        if let Some(index) = armed {
            let exhausted = match &mut failures[index].remaining {
                Some(n) => {
                    *n -= 1;
                    *n == 0
                }
                None => false,
            };
            if exhausted {
                failures.remove(index);
            }
            return Err(RuntimeError::failed(operation, "injected failure"));
        }
        Ok(())
    }

    fn image_of(&self, handle: &WorkloadHandle) -> Option<String> {
        self.containers.get(handle).map(|c| c.image.clone())
    }

    fn transition(
        &self,
        handle: &WorkloadHandle,
        state: ContainerState,
    ) -> Result<(), RuntimeError> {
        let mut container = self
            .containers
            .get_mut(handle)
            .ok_or_else(|| RuntimeError::ContainerNotFound(handle.to_string()))?;
        container.state = state;
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for SimulatedRuntime {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn pull(&self, image: &str, cancel: &CancellationToken) -> Result<(), RuntimeError> {
        self.enter(Operation::Pull, Some(image), cancel).await?;
        self.images.insert(image.to_string());
        Ok(())
    }

    async fn create(
        &self,
        image: &str,
        cancel: &CancellationToken,
    ) -> Result<WorkloadHandle, RuntimeError> {
        self.enter(Operation::Create, Some(image), cancel).await?;
        if !self.images.contains(image) {
            return Err(RuntimeError::ImageNotFound(image.to_string()));
        }

        let handle = WorkloadHandle::new(Uuid::new_v4().simple().to_string());
        self.containers.insert(
            handle.clone(),
            SimulatedContainer {
                image: image.to_string(),
                state: ContainerState::Created,
            },
        );
        Ok(handle)
    }

    async fn start(
        &self,
        handle: &WorkloadHandle,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let image = self.image_of(handle);
        self.enter(Operation::Start, image.as_deref(), cancel).await?;
        self.transition(handle, ContainerState::Running)
    }

    async fn stop(
        &self,
        handle: &WorkloadHandle,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let image = self.image_of(handle);
        self.enter(Operation::Stop, image.as_deref(), cancel).await?;
        self.transition(handle, ContainerState::Stopped)
    }

    async fn remove(
        &self,
        handle: &WorkloadHandle,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let image = self.image_of(handle);
        self.enter(Operation::Remove, image.as_deref(), cancel).await?;
        self.containers
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::ContainerNotFound(handle.to_string()))
    }
}
