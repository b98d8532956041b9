//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// No run has been started
    #[default]
    Idle,
    /// A run is streaming progress
    Running,
    /// The engine reported completion
    Success,
    /// The run failed (validation passed, then engine or transport failed)
    Error,
}

impl RunState {
    /// Check if the run reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Success | RunState::Error)
    }
}

/// Progress of a single node during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRunState {
    /// Not reached yet in this run
    #[default]
    Unvisited,
    /// Currently executing (at most one node at a time)
    Active,
    /// Finished executing
    Completed,
    /// Reported by the engine as run in demo/simulated mode
    Simulated,
}

/// Per-run progress bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTracker {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current run status
    pub state: RunState,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,

    /// Node id -> progress
    nodes: BTreeMap<String, NodeRunState>,
}

impl RunTracker {
    /// Create an idle tracker
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Idle,
            started_at: None,
            finished_at: None,
            nodes: BTreeMap::new(),
        }
    }

    /// Reset every node to `Unvisited` and mark the run as started
    pub fn begin<'a>(&mut self, node_ids: impl IntoIterator<Item = &'a str>) {
        self.run_id = Uuid::new_v4();
        self.nodes = node_ids
            .into_iter()
            .map(|id| (id.to_string(), NodeRunState::Unvisited))
            .collect();
        self.state = RunState::Running;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
    }

    /// Make `node_id` the only active node
    ///
    /// Returns false when the node is not part of this run.
    pub fn activate(&mut self, node_id: &str) -> bool {
        if !self.nodes.contains_key(node_id) {
            return false;
        }
        self.clear_active();
        self.nodes.insert(node_id.to_string(), NodeRunState::Active);
        true
    }

    /// Move `node_id` to `Completed`
    pub fn complete(&mut self, node_id: &str) {
        if let Some(state) = self.nodes.get_mut(node_id) {
            *state = NodeRunState::Completed;
        }
    }

    /// Mark a node as simulated by the engine
    pub fn simulate(&mut self, node_id: &str) -> bool {
        match self.nodes.get_mut(node_id) {
            Some(state) => {
                *state = NodeRunState::Simulated;
                true
            }
            None => false,
        }
    }

    /// Demote any active node back to `Completed`
    pub fn clear_active(&mut self) {
        for state in self.nodes.values_mut() {
            if *state == NodeRunState::Active {
                *state = NodeRunState::Completed;
            }
        }
    }

    /// Mark the run as succeeded
    pub fn succeed(&mut self) {
        self.clear_active();
        self.state = RunState::Success;
        self.finished_at = Some(Utc::now());
    }

    /// Mark the run as failed; completed nodes are kept
    pub fn fail(&mut self) {
        self.clear_active();
        self.state = RunState::Error;
        self.finished_at = Some(Utc::now());
    }

    /// Progress of a node
    pub fn node_state(&self, node_id: &str) -> Option<NodeRunState> {
        self.nodes.get(node_id).copied()
    }

    /// Ids of nodes in the given state, sorted
    pub fn nodes_in(&self, wanted: NodeRunState) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, state)| **state == wanted)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of nodes currently active
    pub fn active_count(&self) -> usize {
        self.nodes.values().filter(|s| **s == NodeRunState::Active).count()
    }

    /// Take a point-in-time copy for renderers
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            state: self.state,
            nodes: self.nodes.clone(),
        }
    }

    /// Calculate progress (0.0 to 1.0) as visited / total nodes
    pub fn progress(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let visited = self
            .nodes
            .values()
            .filter(|s| matches!(s, NodeRunState::Completed | NodeRunState::Simulated))
            .count();
        visited as f64 / self.nodes.len() as f64
    }
}

impl Default for RunTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a run, handed to renderers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub state: RunState,
    pub nodes: BTreeMap<String, NodeRunState>,
}

impl RunSnapshot {
    pub fn node_state(&self, node_id: &str) -> Option<NodeRunState> {
        self.nodes.get(node_id).copied()
    }

    pub fn active_count(&self) -> usize {
        self.nodes.values().filter(|s| **s == NodeRunState::Active).count()
    }
}
