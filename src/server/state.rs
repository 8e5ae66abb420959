use std::sync::Arc;

use crate::cluster::PodManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<PodManager>,
}

impl AppState {
    pub fn new(manager: PodManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }

    pub fn from_shared(manager: Arc<PodManager>) -> Self {
        Self { manager }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{LifecycleConfig, NodeRegistry};
    use crate::runtime::SimulatedRuntime;

    #[test]
    fn test_state_shares_one_manager() {
        let nodes = NodeRegistry::with_nodes([("node1", 1)]).unwrap();
        let manager = PodManager::new(nodes, Arc::new(SimulatedRuntime::new()), LifecycleConfig::default());
        let state = AppState::new(manager);
        let clone = state.clone();

        assert!(Arc::ptr_eq(&state.manager, &clone.manager));
        assert_eq!(clone.manager.list_nodes().len(), 1);
    }
}
