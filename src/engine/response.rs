//! Engine error and blocking-run response types

use crate::engine::events::{CompletePayload, EngineEvent, ErrorPayload};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error types for engine transport
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine unreachable at {endpoint}: {message}")]
    Unreachable { endpoint: String, message: String },

    #[error("Engine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

/// Body of a blocking `POST /run` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,

    /// Failure text; the engine sends an empty string on success
    #[serde(default)]
    pub error: Option<String>,

    /// Set when the failure was an authentication or session problem
    #[serde(default)]
    pub auth_error: bool,

    #[serde(default)]
    pub messages: Vec<String>,

    #[serde(default)]
    pub results: Map<String, Value>,

    #[serde(default)]
    pub executed_nodes: Vec<String>,

    #[serde(default)]
    pub simulated_nodes: Vec<String>,
}

impl RunResult {
    /// The terminal stream event equivalent to this response
    pub fn into_event(self) -> EngineEvent {
        if self.success {
            EngineEvent::Complete(CompletePayload {
                success: true,
                messages: self.messages,
                results: self.results,
                executed_nodes: self.executed_nodes,
                simulated_nodes: self.simulated_nodes,
            })
        } else {
            EngineEvent::Error(ErrorPayload {
                error: self.error.filter(|e| !e.is_empty()),
                message: self.messages.into_iter().next(),
                auth_error: self.auth_error,
                ..Default::default()
            })
        }
    }
}
