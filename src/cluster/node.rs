//! Node resource and the node registry
//!
//! A Node is a capacity-bounded placement target. The registry owns every
//! node's usage counters and is the only place capacity is reserved or
//! released:
//! - `reserve` takes one unit if one is free, atomically per node
//! - `release` gives one unit back, floored at zero
//! - `snapshot` reads each node under its own lock, in configured order

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur in the node registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("Node '{0}' not found")]
    NotFound(String),

    #[error("Node '{0}' already registered")]
    AlreadyExists(String),

    #[error("Node name must not be empty")]
    EmptyName,

    #[error("Node '{name}' has invalid capacity {capacity}: must be at least 1")]
    InvalidCapacity { name: String, capacity: u32 },

    #[error("Node '{0}' has no capacity left")]
    CapacityExceeded(String),

    #[error("Node '{name}' still holds {used} reservation(s)")]
    Busy { name: String, used: u32 },
}

/// Point-in-time view of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node name
    pub name: String,

    /// Maximum concurrent pods
    pub capacity: u32,

    /// Reservations currently held
    pub used: u32,

    /// Reservations held by failed pods awaiting operator cleanup
    #[serde(default)]
    pub leaked: u32,
}

impl Node {
    /// Units still free for scheduling
    pub fn available(&self) -> u32 {
        self.capacity.saturating_sub(self.used)
    }
}

#[derive(Debug, Default)]
struct Usage {
    used: u32,
    leaked: u32,
    /// Set when the node is unregistered; blocks late reservations
    retired: bool,
}

#[derive(Debug)]
struct NodeSlot {
    name: String,
    capacity: u32,
    usage: Mutex<Usage>,
}

impl NodeSlot {
    fn usage(&self) -> MutexGuard<'_, Usage> {
        self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn view(&self) -> Node {
        let usage = self.usage();
        Node {
            name: self.name.clone(),
            capacity: self.capacity,
            used: usage.used,
            leaked: usage.leaked,
        }
    }
}

/// Registry of nodes and their capacity counters
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: RwLock<Vec<Arc<NodeSlot>>>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from `(name, capacity)` pairs, keeping their order
    pub fn with_nodes<I, S>(nodes: I) -> Result<Self, NodeError>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let registry = Self::new();
        for (name, capacity) in nodes {
            registry.register(name, capacity)?;
        }
        Ok(registry)
    }

    fn find(&self, name: &str) -> Option<Arc<NodeSlot>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|slot| slot.name == name)
            .cloned()
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Register a new node at the end of the rotation
    pub fn register(&self, name: impl Into<String>, capacity: u32) -> Result<(), NodeError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(NodeError::EmptyName);
        }
        if capacity == 0 {
            return Err(NodeError::InvalidCapacity { name, capacity });
        }

        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if nodes.iter().any(|slot| slot.name == name) {
            return Err(NodeError::AlreadyExists(name));
        }

        debug!("Registered node {} (capacity {})", name, capacity);
        nodes.push(Arc::new(NodeSlot {
            name,
            capacity,
            usage: Mutex::new(Usage::default()),
        }));
        Ok(())
    }

    /// Remove a node that holds no reservations
    pub fn unregister(&self, name: &str) -> Result<Node, NodeError> {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let index = nodes
            .iter()
            .position(|slot| slot.name == name)
            .ok_or_else(|| NodeError::NotFound(name.to_string()))?;

        let slot = Arc::clone(&nodes[index]);
        let mut usage = slot.usage();
        if usage.used > 0 {
            return Err(NodeError::Busy {
                name: name.to_string(),
                used: usage.used,
            });
        }
        usage.retired = true;
        drop(usage);

        nodes.remove(index);
        debug!("Unregistered node {}", name);
        Ok(slot.view())
    }

    // =========================================================================
    // Capacity accounting
    // =========================================================================

    /// Take one unit of capacity on `name`, or fail without side effects
    pub fn reserve(&self, name: &str) -> Result<(), NodeError> {
        let slot = self
            .find(name)
            .ok_or_else(|| NodeError::NotFound(name.to_string()))?;
        let mut usage = slot.usage();

        if usage.retired {
            return Err(NodeError::NotFound(name.to_string()));
        }
        if usage.used >= slot.capacity {
            return Err(NodeError::CapacityExceeded(name.to_string()));
        }
        usage.used += 1;
        Ok(())
    }

    /// Give one unit of capacity back to `name`.
    ///
    /// Callers release exactly once per successful reservation; an extra
    /// release is floored at zero and logged.
    pub fn release(&self, name: &str) -> Result<(), NodeError> {
        let slot = self
            .find(name)
            .ok_or_else(|| NodeError::NotFound(name.to_string()))?;
        let mut usage = slot.usage();

        if usage.used == 0 {
            warn!("Release on node {} with no reservations held", name);
            return Ok(());
        }
        usage.used -= 1;
        Ok(())
    }

    /// Record that one held reservation now belongs to a failed pod
    pub fn mark_leaked(&self, name: &str) -> Result<(), NodeError> {
        let slot = self
            .find(name)
            .ok_or_else(|| NodeError::NotFound(name.to_string()))?;
        let mut usage = slot.usage();
        usage.leaked = (usage.leaked + 1).min(usage.used);
        Ok(())
    }

    /// Undo one `mark_leaked` once the failed pod has been cleaned up
    pub fn clear_leaked(&self, name: &str) -> Result<(), NodeError> {
        let slot = self
            .find(name)
            .ok_or_else(|| NodeError::NotFound(name.to_string()))?;
        let mut usage = slot.usage();
        usage.leaked = usage.leaked.saturating_sub(1);
        Ok(())
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Read-only view of all nodes in configured order.
    ///
    /// Each node is read under its own lock; the sequence as a whole is not a
    /// consistent cut.
    pub fn snapshot(&self) -> Vec<Node> {
        let slots: Vec<Arc<NodeSlot>> = self
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        slots.iter().map(|slot| slot.view()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Node> {
        self.find(name).map(|slot| slot.view())
    }

    /// Node names in rotation order
    pub fn names(&self) -> Vec<String> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|slot| slot.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> NodeRegistry {
        NodeRegistry::with_nodes([("node1", 2), ("node2", 1)]).unwrap()
    }

    #[test]
    fn test_reserve_until_full() {
        let nodes = registry();

        nodes.reserve("node1").unwrap();
        nodes.reserve("node1").unwrap();
        let result = nodes.reserve("node1");

        assert_eq!(result, Err(NodeError::CapacityExceeded("node1".to_string())));
        assert_eq!(nodes.get("node1").unwrap().used, 2);
    }

    #[test]
    fn test_release_floors_at_zero() {
        let nodes = registry();

        nodes.reserve("node2").unwrap();
        nodes.release("node2").unwrap();
        nodes.release("node2").unwrap();

        assert_eq!(nodes.get("node2").unwrap().used, 0);
    }

    #[test]
    fn test_unknown_node() {
        let nodes = registry();
        assert_eq!(nodes.reserve("nope"), Err(NodeError::NotFound("nope".to_string())));
        assert_eq!(nodes.release("nope"), Err(NodeError::NotFound("nope".to_string())));
    }

    #[test]
    fn test_snapshot_keeps_registration_order() {
        let nodes = NodeRegistry::with_nodes([("c", 1), ("a", 1), ("b", 1)]).unwrap();
        let names: Vec<_> = nodes.snapshot().into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_register_rejects_duplicates_and_zero_capacity() {
        let nodes = registry();
        assert_eq!(
            nodes.register("node1", 3),
            Err(NodeError::AlreadyExists("node1".to_string()))
        );
        assert!(matches!(
            nodes.register("node3", 0),
            Err(NodeError::InvalidCapacity { .. })
        ));
        assert_eq!(nodes.register("  ", 1), Err(NodeError::EmptyName));
    }

    #[test]
    fn test_unregister_busy_node() {
        let nodes = registry();
        nodes.reserve("node1").unwrap();

        assert!(matches!(nodes.unregister("node1"), Err(NodeError::Busy { used: 1, .. })));

        nodes.release("node1").unwrap();
        let removed = nodes.unregister("node1").unwrap();
        assert_eq!(removed.name, "node1");
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_leaked_counter() {
        let nodes = registry();
        nodes.reserve("node1").unwrap();
        nodes.mark_leaked("node1").unwrap();

        let node = nodes.get("node1").unwrap();
        assert_eq!(node.used, 1);
        assert_eq!(node.leaked, 1);

        nodes.clear_leaked("node1").unwrap();
        nodes.release("node1").unwrap();
        assert_eq!(nodes.get("node1").unwrap().leaked, 0);
    }

    #[test]
    fn test_available() {
        let nodes = registry();
        nodes.reserve("node1").unwrap();
        let node = nodes.get("node1").unwrap();
        assert_eq!(node.available(), 1);

        nodes.reserve("node1").unwrap();
        assert_eq!(nodes.get("node1").unwrap().available(), 0);
    }

    #[test]
    fn test_concurrent_reservations_never_oversell() {
        let nodes = Arc::new(NodeRegistry::with_nodes([("only", 5)]).unwrap());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let nodes = Arc::clone(&nodes);
                std::thread::spawn(move || nodes.reserve("only").is_ok())
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(granted, 5);
        assert_eq!(nodes.get("only").unwrap().used, 5);
    }
}
