//! Wire types exchanged with the execution engine

use crate::core::{Edge, Node, Pipeline};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Substrings that mark an engine error as an authentication problem
const AUTH_MARKERS: &[&str] = &["authentication", "auth", "expired"];

/// Body of `POST /run` and `POST /run/stream`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl RunRequest {
    pub fn new(pipeline: Pipeline, prompt: Option<String>) -> Self {
        Self {
            nodes: pipeline.nodes,
            edges: pipeline.edges,
            prompt,
        }
    }
}

/// Events streamed by the engine during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Run accepted
    Start {
        #[serde(default)]
        message: Option<String>,
    },

    /// The engine began executing a node
    NodeExecuting { node_id: String },

    /// The engine finished a node
    NodeCompleted {
        node_id: String,
        #[serde(default)]
        error: Option<String>,
    },

    /// Keep-alive during long operations
    Heartbeat {
        #[serde(default)]
        elapsed: Option<u64>,
    },

    /// Terminal success
    Complete(CompletePayload),

    /// Terminal failure
    Error(ErrorPayload),

    /// Any event type this client does not know
    #[serde(other)]
    Unknown,
}

impl EngineEvent {
    /// Whether this event ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::Complete(_) | EngineEvent::Error(_))
    }
}

/// Summary sent with a `complete` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletePayload {
    #[serde(default = "default_success")]
    pub success: bool,

    #[serde(default)]
    pub messages: Vec<String>,

    /// Named artifacts produced by the run
    #[serde(default)]
    pub results: Map<String, Value>,

    #[serde(default)]
    pub executed_nodes: Vec<String>,

    /// Nodes the engine ran in demo mode
    #[serde(default)]
    pub simulated_nodes: Vec<String>,
}

fn default_success() -> bool {
    true
}

impl Default for CompletePayload {
    fn default() -> Self {
        Self {
            success: true,
            messages: Vec::new(),
            results: Map::new(),
            executed_nodes: Vec::new(),
            simulated_nodes: Vec::new(),
        }
    }
}

/// Details sent with an `error` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub auth_error: bool,

    #[serde(default)]
    pub node_id: Option<String>,
}

impl ErrorPayload {
    /// Human-readable failure text
    pub fn text(&self) -> String {
        [self.error.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or("Unknown engine error")
            .to_string()
    }

    /// Flagged by the engine, or the text mentions authentication or expiry
    pub fn is_auth(&self) -> bool {
        if self.auth_error {
            return true;
        }
        let text = self.text().to_lowercase();
        AUTH_MARKERS.iter().any(|marker| text.contains(marker))
    }
}
