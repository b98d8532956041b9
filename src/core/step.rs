//! Step type domain model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of step kinds a pipeline node can have
///
/// Wire names match the editor's node types so saved documents stay readable
/// by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StepType {
    /// Table or view read from the warehouse
    #[serde(rename = "snowflakeSource")]
    Source,
    /// Semantic model describing the data source
    #[serde(rename = "semanticModel")]
    SemanticLayer,
    /// Language-model agent with optional tools
    #[serde(rename = "agent", alias = "cortexAgent")]
    CompletionAgent,
    /// Terminal output shown to the user
    #[serde(rename = "output")]
    TerminalOutput,
    /// Single completion function call (summarize, classify, ...)
    #[serde(rename = "cortexFunction", alias = "cortex")]
    CompletionFunction,
    /// If/else branch on upstream results
    #[serde(rename = "condition")]
    ConditionalBranch,
    /// Agent hosted outside the warehouse
    #[serde(rename = "externalAgent")]
    ExternalAgent,
    /// Routes the request to exactly one downstream agent
    #[serde(rename = "router")]
    Router,
    /// Delegates to several agents and aggregates their answers
    #[serde(rename = "supervisor")]
    Supervisor,
    /// Schema migration: uploaded source file
    #[serde(rename = "fileInput")]
    FileInput,
    /// Schema migration: extracts a schema from the input file
    #[serde(rename = "schemaExtractor")]
    SchemaExtractor,
    /// Schema migration: rewrites the extracted schema
    #[serde(rename = "schemaTransformer")]
    SchemaTransformer,
    /// Schema migration: generated file artifact
    #[serde(rename = "fileOutput")]
    FileOutput,
}

impl StepType {
    /// Every step type, in palette order
    pub const ALL: [StepType; 13] = [
        StepType::Source,
        StepType::SemanticLayer,
        StepType::CompletionAgent,
        StepType::TerminalOutput,
        StepType::CompletionFunction,
        StepType::ConditionalBranch,
        StepType::ExternalAgent,
        StepType::Router,
        StepType::Supervisor,
        StepType::FileInput,
        StepType::SchemaExtractor,
        StepType::SchemaTransformer,
        StepType::FileOutput,
    ];

    /// Terminal steps may never be the source of an edge
    pub fn is_terminal(self) -> bool {
        matches!(self, StepType::TerminalOutput | StepType::FileOutput)
    }

    /// Steps whose data receives generated content after a successful run
    pub fn receives_content(self) -> bool {
        self.is_terminal()
    }

    /// Name used on the wire and in documents
    pub fn wire_name(self) -> &'static str {
        match self {
            StepType::Source => "snowflakeSource",
            StepType::SemanticLayer => "semanticModel",
            StepType::CompletionAgent => "agent",
            StepType::TerminalOutput => "output",
            StepType::CompletionFunction => "cortexFunction",
            StepType::ConditionalBranch => "condition",
            StepType::ExternalAgent => "externalAgent",
            StepType::Router => "router",
            StepType::Supervisor => "supervisor",
            StepType::FileInput => "fileInput",
            StepType::SchemaExtractor => "schemaExtractor",
            StepType::SchemaTransformer => "schemaTransformer",
            StepType::FileOutput => "fileOutput",
        }
    }

    /// Human-readable label used in guidance messages
    pub fn label(self) -> &'static str {
        match self {
            StepType::Source => "Data Source",
            StepType::SemanticLayer => "Semantic Model",
            StepType::CompletionAgent => "Agent",
            StepType::TerminalOutput => "Output",
            StepType::CompletionFunction => "Cortex Function",
            StepType::ConditionalBranch => "Condition",
            StepType::ExternalAgent => "External Agent",
            StepType::Router => "Router",
            StepType::Supervisor => "Supervisor",
            StepType::FileInput => "File Input",
            StepType::SchemaExtractor => "Schema Extractor",
            StepType::SchemaTransformer => "Schema Transformer",
            StepType::FileOutput => "File Output",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StepType {
    type Err = String;

    /// Accepts wire names and their aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cortexAgent" => return Ok(StepType::CompletionAgent),
            "cortex" => return Ok(StepType::CompletionFunction),
            _ => {}
        }
        StepType::ALL
            .iter()
            .copied()
            .find(|t| t.wire_name() == s)
            .ok_or_else(|| format!("Unknown step type: {}", s))
    }
}
