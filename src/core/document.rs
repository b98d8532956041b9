//! Pipeline interchange document (export / import)

use crate::core::pipeline::{Edge, Node, Pipeline};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Current document format version
pub const DOCUMENT_VERSION: &str = "1.0";

/// Name given to documents that carry none
pub const DEFAULT_NAME: &str = "Imported Workflow";

/// Error types for reading and writing documents
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid workflow file: missing '{0}' array")]
    MissingArray(&'static str),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level exported pipeline document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDocument {
    /// Pipeline name
    #[serde(default = "default_name")]
    pub name: String,

    /// Document format version
    #[serde(default = "default_version")]
    pub version: String,

    /// When the document was exported
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,

    /// Pipeline steps
    pub nodes: Vec<Node>,

    /// Connections between steps
    pub edges: Vec<Edge>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

impl PipelineDocument {
    /// Export a pipeline, stamping the current time
    pub fn export(pipeline: &Pipeline) -> Self {
        Self {
            name: pipeline.name.clone(),
            version: DOCUMENT_VERSION.to_string(),
            exported_at: Some(Utc::now()),
            nodes: pipeline.nodes.clone(),
            edges: pipeline.edges.clone(),
        }
    }

    /// Parse a document from JSON text
    ///
    /// The `nodes` and `edges` arrays must both be present before anything is
    /// deserialized.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let raw: Value = serde_json::from_str(json)?;
        for key in ["nodes", "edges"] {
            if !raw.get(key).is_some_and(Value::is_array) {
                return Err(DocumentError::MissingArray(key));
            }
        }
        Ok(serde_json::from_value(raw)?)
    }

    /// Load a document from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Pretty JSON text
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the document to a file
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), DocumentError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Convert into the in-memory pipeline model
    pub fn into_pipeline(self) -> Pipeline {
        Pipeline {
            name: self.name,
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}
