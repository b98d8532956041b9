//! Local structural checks run before a pipeline is dispatched
//!
//! Nothing here touches the network. Errors block a run; warnings are shown to
//! the user and the run proceeds.

use crate::core::{Pipeline, StepType};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// Whether an issue blocks execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// A single finding with a suggested fix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub code: &'static str,
    pub severity: IssueSeverity,
    pub message: String,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

/// Result of [`preflight`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreflightReport {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl PreflightReport {
    /// True if no blocking errors
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn error(&mut self, code: &'static str, message: String, suggestion: &str, node_id: Option<&str>) {
        self.errors.push(Issue {
            code,
            severity: IssueSeverity::Error,
            message,
            suggestion: suggestion.to_string(),
            node_id: node_id.map(str::to_string),
        });
    }

    fn warning(&mut self, code: &'static str, message: String, suggestion: String, node_id: &str) {
        self.warnings.push(Issue {
            code,
            severity: IssueSeverity::Warning,
            message,
            suggestion,
            node_id: Some(node_id.to_string()),
        });
    }

    /// One-line summary of the blocking errors
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|i| i.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Run every structural check against a pipeline snapshot
pub fn preflight(pipeline: &Pipeline) -> PreflightReport {
    let mut report = PreflightReport::default();

    if pipeline.is_empty() {
        report.error(
            "EMPTY_GRAPH",
            "No nodes in the workflow".to_string(),
            "Add nodes to your workflow. Start with a Data Source, then add an Agent and Output.",
            None,
        );
        return report;
    }

    check_outputs(pipeline, &mut report);
    check_orphans(pipeline, &mut report);
    check_semantic_bypass(pipeline, &mut report);
    check_agents(pipeline, &mut report);
    check_semantic_layers(pipeline, &mut report);

    report
}

fn check_outputs(pipeline: &Pipeline, report: &mut PreflightReport) {
    for node in pipeline.nodes_of_type(StepType::TerminalOutput) {
        if pipeline.incoming(&node.id).next().is_none() {
            report.error(
                "OUTPUT_DISCONNECTED",
                format!("'{}' has no incoming connection", node.label()),
                "Connect an Agent or another step into the Output so it has something to show.",
                Some(&node.id),
            );
        }
    }
}

fn check_orphans(pipeline: &Pipeline, report: &mut PreflightReport) {
    if pipeline.nodes.len() < 2 {
        return;
    }
    let connected: HashSet<&str> = pipeline
        .edges
        .iter()
        .flat_map(|e| [e.source.as_str(), e.target.as_str()])
        .collect();

    for node in &pipeline.nodes {
        if !connected.contains(node.id.as_str()) {
            let label = node.label();
            report.warning(
                "ORPHAN_NODE",
                format!("'{}' is not connected to any other node", label),
                format!(
                    "Connect '{}' to other nodes using edges, or remove it if not needed.",
                    label
                ),
                &node.id,
            );
        }
    }
}

/// Completion functions reachable from a source without crossing a semantic layer
fn bypassed_functions(pipeline: &Pipeline) -> Vec<&str> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = pipeline
        .nodes_of_type(StepType::Source)
        .map(|n| n.id.as_str())
        .collect();
    visited.extend(queue.iter().copied());

    let mut found = Vec::new();
    while let Some(id) = queue.pop_front() {
        for edge in pipeline.outgoing(id) {
            let target = edge.target.as_str();
            if !visited.insert(target) {
                continue;
            }
            match pipeline.step_type(target) {
                Some(StepType::SemanticLayer) | None => {}
                Some(StepType::CompletionFunction) => {
                    found.push(target);
                    queue.push_back(target);
                }
                Some(_) => queue.push_back(target),
            }
        }
    }

    // Keep node order stable for display
    pipeline
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| found.contains(id))
        .collect()
}

fn check_semantic_bypass(pipeline: &Pipeline, report: &mut PreflightReport) {
    for id in bypassed_functions(pipeline) {
        let label = pipeline.node(id).map(|n| n.label()).unwrap_or_default();
        report.warning(
            "SEMANTIC_BYPASS",
            format!("'{}' reads source data without a Semantic Model in between", label),
            "Insert a Semantic Model between the Data Source and the Cortex Function so it sees business definitions.".to_string(),
            id,
        );
    }
}

fn has_text(node: &crate::core::Node, keys: &[&str]) -> bool {
    keys.iter().any(|key| {
        node.data
            .get(*key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| !s.trim().is_empty())
    })
}

fn check_agents(pipeline: &Pipeline, report: &mut PreflightReport) {
    for node in pipeline.nodes_of_type(StepType::CompletionAgent) {
        let label = node.label();
        if !has_text(node, &["model", "cortexModel"]) {
            report.warning(
                "NO_MODEL_SELECTED",
                format!("Agent '{}' has no Cortex model selected", label),
                "A default model will be used. For better results, select a specific model like 'llama3.1-70b'.".to_string(),
                &node.id,
            );
        }
        if pipeline.nodes.len() > 1 && pipeline.incoming(&node.id).next().is_none() {
            report.warning(
                "AGENT_NO_DATA_INPUT",
                format!("Agent '{}' is not connected to a data source", label),
                "Connect a Data Source or Semantic Model to the agent for data-grounded responses.".to_string(),
                &node.id,
            );
        }
    }
}

fn check_semantic_layers(pipeline: &Pipeline, report: &mut PreflightReport) {
    for node in pipeline.nodes_of_type(StepType::SemanticLayer) {
        if !has_text(node, &["semanticPath", "path"]) {
            report.warning(
                "NO_SEMANTIC_PATH",
                format!("Semantic model '{}' has no file path configured", node.label()),
                "Select a semantic model YAML file from the catalog, or specify the stage path.".to_string(),
                &node.id,
            );
        }
    }
}
