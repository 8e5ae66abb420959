//! Pod resource and the pod registry
//!
//! A Pod is one scheduled workload: a single container bound to a single node.
//! Records enter the registry only after the container is running, so readers
//! never observe a half-built pod.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::runtime::WorkloadHandle;

/// Client-supplied description of a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    /// Display name, not required to be unique
    #[serde(default)]
    pub name: String,

    /// Container image reference
    #[serde(default)]
    pub image: String,
}

impl PodSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
        }
    }
}

/// Lifecycle phase of a pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    /// Accepted, no node chosen yet
    Pending,
    /// Node chosen and capacity reserved
    Scheduled,
    /// Container confirmed started
    Running,
    /// Stop/remove in progress
    Deleting,
    /// Container removed and capacity released
    Deleted,
    /// A step could not complete; capacity stays held until deleted
    Failed,
}

impl PodPhase {
    /// Phases that count toward a node's live usage
    pub fn is_active(self) -> bool {
        matches!(self, PodPhase::Scheduled | PodPhase::Running)
    }

    /// Phases from which a delete may start
    pub fn is_deletable(self) -> bool {
        matches!(
            self,
            PodPhase::Scheduled | PodPhase::Running | PodPhase::Failed
        )
    }
}

/// A pod record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    /// Runtime-assigned workload identifier
    pub id: String,

    pub name: String,

    pub image: String,

    pub state: PodPhase,

    /// Node holding this pod's reservation
    #[serde(rename = "nodeName")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Failure details for pods in `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Pod {
    /// A pod whose container has been started on `node`
    pub fn running(handle: &WorkloadHandle, spec: &PodSpec, node: impl Into<String>) -> Self {
        Self {
            id: handle.to_string(),
            name: spec.name.clone(),
            image: spec.image.clone(),
            state: PodPhase::Running,
            node_name: Some(node.into()),
            created_at: Utc::now(),
            message: None,
        }
    }

    /// Mark as failed with a reason
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.state = PodPhase::Failed;
        self.message = Some(message.into());
        self
    }

    pub fn handle(&self) -> WorkloadHandle {
        WorkloadHandle::new(self.id.clone())
    }

    /// Check if this pod is bound to a node
    pub fn is_bound(&self) -> bool {
        self.node_name.is_some()
    }
}

/// Keyed store of pod records.
///
/// Operations on one pod id are linearizable; nothing is promised across ids.
#[derive(Debug, Default)]
pub struct PodRegistry {
    pods: DashMap<String, Pod>,
}

impl PodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. An id that is already bound is never overwritten;
    /// the rejected record is handed back.
    pub fn insert(&self, pod: Pod) -> Result<(), Pod> {
        match self.pods.entry(pod.id.clone()) {
            Entry::Occupied(_) => Err(pod),
            Entry::Vacant(slot) => {
                slot.insert(pod);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Pod> {
        self.pods.get(id).map(|r| r.clone())
    }

    pub fn delete(&self, id: &str) -> Option<Pod> {
        self.pods.remove(id).map(|(_, pod)| pod)
    }

    /// Point-in-time list, oldest first
    pub fn list(&self) -> Vec<Pod> {
        let mut pods: Vec<Pod> = self.pods.iter().map(|r| r.clone()).collect();
        pods.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        pods
    }

    /// Move a deletable pod to `Deleting`.
    ///
    /// Returns the record as it was before the transition, or `None` if the
    /// pod is missing or a delete is already underway.
    pub fn begin_delete(&self, id: &str) -> Option<Pod> {
        let mut pod = self.pods.get_mut(id)?;
        if !pod.state.is_deletable() {
            return None;
        }
        let previous = pod.clone();
        pod.state = PodPhase::Deleting;
        Some(previous)
    }

    /// Mark a pod failed, keeping its binding
    pub fn mark_failed(&self, id: &str, message: impl Into<String>) -> Option<Pod> {
        let mut pod = self.pods.get_mut(id)?;
        pod.state = PodPhase::Failed;
        pod.message = Some(message.into());
        Some(pod.clone())
    }

    /// Count pods on `node` whose phase satisfies `filter`
    pub fn count_on_node(&self, node: &str, filter: impl Fn(PodPhase) -> bool) -> usize {
        self.pods
            .iter()
            .filter(|r| r.node_name.as_deref() == Some(node) && filter(r.state))
            .count()
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}
