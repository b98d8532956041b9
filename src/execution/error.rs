//! Run failure taxonomy

use crate::engine::{DecodeError, EngineError};
use crate::graph::PreflightReport;
use thiserror::Error;

/// Remediation shown with authentication failures
pub const AUTH_REMEDIATION: &str =
    "Your Snowflake session may have expired. Refresh the engine's credentials and run again.";

/// Error types for a pipeline run
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// Structural pre-flight failure; nothing was sent
    #[error("Pipeline is not runnable: {}", .0.summary())]
    Validation(PreflightReport),

    /// Prompt sanitization failure; nothing was sent
    #[error("Prompt rejected: {reason}")]
    InputRejected { reason: String },

    /// Network or stream failure
    #[error("Engine connection failed: {message}")]
    Transport { message: String },

    /// Engine-reported failure classified as authentication or expiry
    #[error("Authentication failed: {message}")]
    Auth {
        message: String,
        node_id: Option<String>,
    },

    /// Any other engine-reported failure
    #[error("Engine error: {message}")]
    Engine {
        message: String,
        node_id: Option<String>,
    },

    #[error("A run is already in progress")]
    Busy,
}

impl RunError {
    pub fn transport(message: impl Into<String>) -> Self {
        RunError::Transport {
            message: message.into(),
        }
    }

    /// Suggested user action, when there is a specific one
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            RunError::Auth { .. } => Some(AUTH_REMEDIATION),
            RunError::Transport { .. } => Some("Check that the execution engine is running and reachable."),
            RunError::InputRejected { .. } => {
                Some("Ask a natural language question about your data, e.g. 'What are total sales by region?'")
            }
            _ => None,
        }
    }

    /// Node the engine blamed, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            RunError::Auth { node_id, .. } | RunError::Engine { node_id, .. } => node_id.as_deref(),
            _ => None,
        }
    }

    /// True if the failure happened before anything was sent to the engine
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            RunError::Validation(_) | RunError::InputRejected { .. } | RunError::Busy
        )
    }
}

impl From<EngineError> for RunError {
    fn from(e: EngineError) -> Self {
        RunError::transport(e.to_string())
    }
}

impl From<DecodeError> for RunError {
    fn from(e: DecodeError) -> Self {
        RunError::transport(format!("Malformed event: {}", e))
    }
}
