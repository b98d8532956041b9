//! Pipeline domain model

use crate::core::step::StepType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form node configuration, keyed by field name
pub type NodeData = Map<String, Value>;

/// Canvas position of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A configured step in a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier
    pub id: String,

    /// Step kind (immutable once the node exists)
    #[serde(rename = "type")]
    pub step_type: StepType,

    /// Canvas position
    #[serde(default)]
    pub position: Position,

    /// Step configuration; schema depends on `step_type`
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    /// Create a node with empty data
    pub fn new(id: impl Into<String>, step_type: StepType, position: Position) -> Self {
        Self {
            id: id.into(),
            step_type,
            position,
            data: NodeData::new(),
        }
    }

    /// Builder-style helper to set a single data field
    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Display label: `data.label`, then `data.name`, then the step type
    pub fn label(&self) -> String {
        self.data
            .get("label")
            .or_else(|| self.data.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.step_type.label().to_string())
    }
}

/// A directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Unique edge identifier
    pub id: String,

    /// Upstream node id
    pub source: String,

    /// Downstream node id
    pub target: String,

    /// Named output port on the source node
    #[serde(default)]
    pub source_handle: Option<String>,

    /// Named input port on the target node
    #[serde(default)]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    /// Conventional edge id: `e-<source>-<target>`, suffixed with the source handle if any
    pub fn conventional_id(source: &str, target: &str, source_handle: Option<&str>) -> String {
        match source_handle {
            Some(handle) => format!("e-{}-{}-{}", source, target, handle),
            None => format!("e-{}-{}", source, target),
        }
    }
}

/// A pipeline definition (aka workflow)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Pipeline steps
    pub nodes: Vec<Node>,

    /// Connections between steps
    pub edges: Vec<Edge>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Get a node by ID
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get the step type of a node by ID
    pub fn step_type(&self, id: &str) -> Option<StepType> {
        self.node(id).map(|n| n.step_type)
    }

    /// Edges ending at the given node
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// Edges starting at the given node
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Nodes of a given step type
    pub fn nodes_of_type(&self, step_type: StepType) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(move |n| n.step_type == step_type)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
