//! # Cluster state and pod lifecycle
//!
//! Everything that decides where a pod runs and keeps the books on it.
//!
//! ## Core Resources
//!
//! - **Node**: a named placement target with a fixed number of pod slots
//! - **Pod**: one container bound to one node
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        PodManager                         │
//! │  ┌────────────────┐  ┌──────────────┐  ┌──────────────┐  │
//! │  │ RoundRobin     │─▶│ NodeRegistry │  │ PodRegistry  │  │
//! │  │ Scheduler      │  │ (capacity)   │  │ (records)    │  │
//! │  └────────────────┘  └──────────────┘  └──────────────┘  │
//! └──────────────────────────────┬───────────────────────────┘
//!                                ▼
//!                      ContainerRuntime (docker / simulated)
//! ```
//!
//! The scheduler selects and reserves in one step. The manager sequences
//! pull, create and start, and undoes the reservation when any step fails.

pub mod manager;
pub mod node;
pub mod pod;
pub mod resources;
pub mod scheduler;

pub use manager::{ClusterStats, LifecycleConfig, PodError, PodManager};
pub use node::{Node, NodeError, NodeRegistry};
pub use pod::{Pod, PodPhase, PodRegistry, PodSpec};
pub use resources::*;
pub use scheduler::{RoundRobinScheduler, SchedulerError};

/// Default API server port
pub const API_PORT: u16 = 8080;

/// Nodes used when no configuration says otherwise
pub const DEFAULT_NODES: [(&str, u32); 3] = [("node1", 2), ("node2", 2), ("node3", 2)];
