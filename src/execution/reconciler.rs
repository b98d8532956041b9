//! Writes a run's generated content into the pipeline's output steps

use crate::engine::CompletePayload;
use crate::graph::GraphStore;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Data key under which output steps receive generated content
pub const CONTENT_KEY: &str = "generatedContent";

/// Result keys checked for content, highest priority first
pub const RESULT_KEYS: &[&str] = &["output_content", "generated_yaml", "agent_response"];

/// Maps a completion payload onto output and file-output node data
pub struct NodeContentReconciler;

impl NodeContentReconciler {
    /// Pick the content to display from a run's results
    pub fn select(results: &Map<String, Value>) -> Option<&str> {
        RESULT_KEYS.iter().find_map(|key| {
            results
                .get(*key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
        })
    }

    /// Patch every content-receiving node; returns the patched node ids
    ///
    /// Applying the same payload twice leaves the same node data.
    pub fn reconcile(store: &mut GraphStore, payload: &CompletePayload) -> Vec<String> {
        let Some(content) = Self::select(&payload.results) else {
            debug!("Run produced no displayable content");
            return Vec::new();
        };

        let targets: Vec<String> = store
            .nodes()
            .iter()
            .filter(|n| n.step_type.receives_content())
            .map(|n| n.id.clone())
            .collect();

        let mut patched = Vec::with_capacity(targets.len());
        for id in targets {
            let mut data = Map::new();
            data.insert(CONTENT_KEY.to_string(), Value::String(content.to_string()));
            match store.update_node_data(&id, data) {
                Ok(()) => patched.push(id),
                Err(e) => warn!("Could not write generated content to {}: {}", id, e),
            }
        }
        debug!("Wrote {} chars of content to {} nodes", content.len(), patched.len());
        patched
    }
}
