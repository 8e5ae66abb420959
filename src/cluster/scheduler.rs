//! Round-robin node selection
//!
//! Selection and reservation happen in one call: a node is only returned once
//! a unit of its capacity is already held for the caller, so two concurrent
//! creates can never both claim the last free slot.

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tracing::trace;

use super::node::NodeRegistry;

/// Errors that can occur while selecting a node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("No capacity available on any of {nodes} node(s)")]
    NoCapacityAvailable { nodes: usize },
}

/// Round-robin scheduler with a cursor shared across calls
#[derive(Debug, Default)]
pub struct RoundRobinScheduler {
    cursor: AtomicUsize,
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a node and reserve one unit of capacity on it.
    ///
    /// The cursor advances once per call whatever the outcome. Candidates are
    /// tried in rotation order starting at the cursor; the first successful
    /// reservation wins. After a full rotation without success nothing is
    /// left reserved.
    pub fn select_node(&self, nodes: &NodeRegistry) -> Result<String, SchedulerError> {
        let names = nodes.names();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);

        if names.is_empty() {
            return Err(SchedulerError::NoCapacityAvailable { nodes: 0 });
        }

        for offset in 0..names.len() {
            let candidate = &names[(start.wrapping_add(offset)) % names.len()];
            match nodes.reserve(candidate) {
                Ok(()) => return Ok(candidate.clone()),
                Err(e) => trace!("Skipping node {}: {}", candidate, e),
            }
        }

        Err(SchedulerError::NoCapacityAvailable { nodes: names.len() })
    }
}
