//! Canonical node/edge store for the pipeline being edited

use crate::core::{
    tools::{ToolPatch, ToolSet, TOOLS_KEY},
    Edge, Node, NodeData, Pipeline, Position, StepType, ToolError,
};
use crate::graph::validator::ConnectionValidator;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Error types for graph mutations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphError {
    #[error("Node '{0}' already exists")]
    DuplicateNode(String),

    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    #[error("Edge '{0}' already exists")]
    DuplicateEdge(String),

    #[error("Edge '{0}' not found")]
    EdgeNotFound(String),

    #[error("Edge '{edge}' references missing node '{node}'")]
    MissingEndpoint { edge: String, node: String },

    #[error("{message}")]
    ConnectionRejected {
        source_type: StepType,
        target_type: StepType,
        message: String,
    },

    #[error("Pipeline is read-only while a run is in progress")]
    Locked,

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// A successful mutation, broadcast to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum GraphChange {
    NodeAdded(String),
    NodeUpdated(String),
    NodeRemoved(String),
    EdgeAdded(String),
    EdgeRemoved(String),
    Replaced,
    Cleared,
    ReadOnly(bool),
}

/// Type for change handlers
pub type ChangeHandler = Arc<dyn Fn(&GraphChange) + Send + Sync>;

/// Allocates node ids for one store
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    next: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next `node_<n>` id not contained in `taken`
    pub fn next_id(&mut self, taken: &HashSet<&str>) -> String {
        loop {
            self.next += 1;
            let candidate = format!("node_{}", self.next);
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
        }
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// Owns the nodes and edges of the pipeline being edited
pub struct GraphStore {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    ids: IdGenerator,
    read_only: bool,
    handlers: Vec<ChangeHandler>,
}

impl GraphStore {
    /// Create an empty store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            ids: IdGenerator::new(),
            read_only: false,
            handlers: Vec::new(),
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: Fn(&GraphChange) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    fn emit(&self, change: GraphChange) {
        debug!("Graph change: {:?}", change);
        for handler in &self.handlers {
            handler(&change);
        }
    }

    fn ensure_editable(&self) -> Result<(), GraphError> {
        if self.read_only {
            warn!("Rejected structural edit while pipeline is read-only");
            return Err(GraphError::Locked);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Lock or unlock structural edits
    pub fn set_read_only(&mut self, read_only: bool) {
        if self.read_only != read_only {
            self.read_only = read_only;
            self.emit(GraphChange::ReadOnly(read_only));
        }
    }

    /// Deep copy of the current pipeline
    pub fn pipeline(&self) -> Pipeline {
        Pipeline {
            name: self.name.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Insert a fully formed node
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        self.ensure_editable()?;
        if self.node(&node.id).is_some() {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        self.nodes.push(node);
        self.emit(GraphChange::NodeAdded(id));
        Ok(())
    }

    /// Insert a new node of `step_type` with a generated id
    pub fn create_node(&mut self, step_type: StepType, position: Position) -> Result<String, GraphError> {
        self.ensure_editable()?;
        let id = {
            let taken: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
            self.ids.next_id(&taken)
        };
        self.add_node(Node::new(id.clone(), step_type, position))?;
        Ok(id)
    }

    /// Shallow-merge `patch` into a node's data
    ///
    /// Top-level keys in `patch` replace the existing values; nested objects are
    /// not merged. Allowed while read-only.
    pub fn update_node_data(&mut self, id: &str, patch: NodeData) -> Result<(), GraphError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        for (key, value) in patch {
            node.data.insert(key, value);
        }
        self.emit(GraphChange::NodeUpdated(id.to_string()));
        Ok(())
    }

    /// Update one tool of an agent node through its variant's patch
    pub fn update_tool(&mut self, id: &str, tool_id: &str, patch: &ToolPatch) -> Result<(), GraphError> {
        let node = self
            .node(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        let mut tools = ToolSet::from_value(node.data.get(TOOLS_KEY))?;
        tools.apply(tool_id, patch)?;

        let mut data = NodeData::new();
        data.insert(TOOLS_KEY.to_string(), tools.to_value());
        self.update_node_data(id, data)
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &str) -> Result<(), GraphError> {
        self.ensure_editable()?;
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        self.nodes.remove(index);

        let (dropped, kept): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|e| e.source == id || e.target == id);
        self.edges = kept;

        for edge in dropped {
            self.emit(GraphChange::EdgeRemoved(edge.id));
        }
        self.emit(GraphChange::NodeRemoved(id.to_string()));
        Ok(())
    }

    /// Check an edge against the current nodes and the connection rules
    fn check_edge(nodes: &[Node], edge: &Edge) -> Result<(), GraphError> {
        let find = |node_id: &str| {
            nodes
                .iter()
                .find(|n| n.id == node_id)
                .map(|n| n.step_type)
                .ok_or_else(|| GraphError::MissingEndpoint {
                    edge: edge.id.clone(),
                    node: node_id.to_string(),
                })
        };
        let source_type = find(&edge.source)?;
        let target_type = find(&edge.target)?;

        let verdict = ConnectionValidator::explain(source_type, target_type);
        if !verdict.accepted {
            return Err(GraphError::ConnectionRejected {
                source_type,
                target_type,
                message: verdict.message,
            });
        }
        Ok(())
    }

    /// Add an edge if both endpoints exist and the connection is allowed
    pub fn connect(&mut self, edge: Edge) -> Result<(), GraphError> {
        self.ensure_editable()?;
        if self.edge(&edge.id).is_some() {
            return Err(GraphError::DuplicateEdge(edge.id));
        }
        if let Err(e) = Self::check_edge(&self.nodes, &edge) {
            warn!("Rejected edge {} ({} -> {}): {}", edge.id, edge.source, edge.target, e);
            return Err(e);
        }
        let id = edge.id.clone();
        self.edges.push(edge);
        self.emit(GraphChange::EdgeAdded(id));
        Ok(())
    }

    /// Connect two nodes using the conventional edge id
    pub fn connect_nodes(
        &mut self,
        source: &str,
        target: &str,
        source_handle: Option<&str>,
        target_handle: Option<&str>,
    ) -> Result<String, GraphError> {
        let mut edge = Edge::new(
            Edge::conventional_id(source, target, source_handle),
            source,
            target,
        );
        edge.source_handle = source_handle.map(str::to_string);
        edge.target_handle = target_handle.map(str::to_string);
        let id = edge.id.clone();
        self.connect(edge)?;
        Ok(id)
    }

    /// Remove a single edge
    pub fn remove_edge(&mut self, id: &str) -> Result<(), GraphError> {
        self.ensure_editable()?;
        let index = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.to_string()))?;
        self.edges.remove(index);
        self.emit(GraphChange::EdgeRemoved(id.to_string()));
        Ok(())
    }

    /// Replace the whole pipeline (load, import, template instantiation)
    ///
    /// The input is copied. Nothing changes unless every node id is unique and
    /// every edge passes the same checks as [`GraphStore::connect`].
    pub fn replace_all(&mut self, nodes: &[Node], edges: &[Edge], name: &str) -> Result<(), GraphError> {
        self.ensure_editable()?;

        let mut seen = HashSet::new();
        for node in nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }
        let mut seen_edges = HashSet::new();
        for edge in edges {
            if !seen_edges.insert(edge.id.as_str()) {
                return Err(GraphError::DuplicateEdge(edge.id.clone()));
            }
            Self::check_edge(nodes, edge)?;
        }

        self.nodes = nodes.to_vec();
        self.edges = edges.to_vec();
        self.name = name.to_string();
        self.emit(GraphChange::Replaced);
        Ok(())
    }

    /// Reset to an empty pipeline
    pub fn clear(&mut self) -> Result<(), GraphError> {
        self.ensure_editable()?;
        self.nodes.clear();
        self.edges.clear();
        self.name.clear();
        self.ids.reset();
        self.emit(GraphChange::Cleared);
        Ok(())
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new("")
    }
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("read_only", &self.read_only)
            .finish()
    }
}
