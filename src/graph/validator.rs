//! Connection rules between step types
//!
//! The reference architecture is a static adjacency table. A step type with no
//! entry is terminal and may not start an edge.

use crate::core::StepType;
use serde::Serialize;

use StepType::*;

/// Allowed targets for each non-terminal step type
const ADJACENCY: &[(StepType, &[StepType])] = &[
    (
        Source,
        &[
            SemanticLayer,
            CompletionAgent,
            CompletionFunction,
            Router,
            Supervisor,
            ConditionalBranch,
            TerminalOutput,
        ],
    ),
    (
        SemanticLayer,
        &[CompletionAgent, CompletionFunction, Router, Supervisor, ConditionalBranch],
    ),
    (
        CompletionAgent,
        &[TerminalOutput, Supervisor, ConditionalBranch, CompletionAgent, ExternalAgent],
    ),
    (CompletionFunction, &[TerminalOutput, ConditionalBranch, CompletionAgent]),
    (
        ConditionalBranch,
        &[CompletionAgent, CompletionFunction, ExternalAgent, TerminalOutput, Router],
    ),
    (ExternalAgent, &[TerminalOutput, Supervisor, ConditionalBranch]),
    (Router, &[CompletionAgent, ExternalAgent, CompletionFunction, Supervisor]),
    (Supervisor, &[TerminalOutput, CompletionAgent, ExternalAgent]),
    (FileInput, &[SchemaExtractor, SchemaTransformer]),
    (SchemaExtractor, &[SchemaTransformer]),
    (SchemaTransformer, &[FileOutput, TerminalOutput]),
];

/// Legal edges that should still surface a warning
const DISCOURAGED: &[(StepType, StepType, &str)] = &[
    (
        Source,
        CompletionFunction,
        "Data Source feeds the Cortex Function directly. Add a Semantic Model in between so the function sees business definitions.",
    ),
    (
        Source,
        TerminalOutput,
        "Data Source goes straight to Output. Raw rows will be shown without any AI step.",
    ),
    (
        FileInput,
        SchemaTransformer,
        "File Input skips the Schema Extractor. The transformer will have to infer the schema itself.",
    ),
];

/// Source-specific remediation shown when an edge is rejected
const GUIDANCE: &[(StepType, &str)] = &[
    (
        TerminalOutput,
        "Output is a terminal step: nothing may follow it. Connect other steps into the Output instead.",
    ),
    (
        FileOutput,
        "File Output is a terminal step: nothing may follow it. It ends the migration flow.",
    ),
    (
        Source,
        "A Data Source must feed a Semantic Model, an Agent, a Cortex Function, or an orchestrator.",
    ),
    (
        SemanticLayer,
        "A Semantic Model feeds Agents, Cortex Functions, Routers, Supervisors or Conditions.",
    ),
    (
        Router,
        "A Router must route to Agents, External Agents, Cortex Functions or a Supervisor.",
    ),
    (
        FileInput,
        "A File Input must feed a Schema Extractor.",
    ),
    (
        SchemaExtractor,
        "A Schema Extractor must feed a Schema Transformer.",
    ),
    (
        SchemaTransformer,
        "A Schema Transformer must end in a File Output or an Output.",
    ),
];

/// How an attempted connection is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// Legal and part of the reference architecture
    Recommended,
    /// Legal, but a warning should be shown
    Discouraged,
    /// Not allowed
    Rejected,
}

/// Result of [`ConnectionValidator::explain`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionVerdict {
    pub accepted: bool,
    pub severity: Severity,
    pub message: String,
}

/// Table-driven connection rules
pub struct ConnectionValidator;

impl ConnectionValidator {
    /// Allowed targets for a source type; empty for terminal types
    pub fn targets(source: StepType) -> &'static [StepType] {
        ADJACENCY
            .iter()
            .find(|(from, _)| *from == source)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    /// Whether an edge from `source` to `target` is legal
    pub fn allows(source: StepType, target: StepType) -> bool {
        Self::targets(source).contains(&target)
    }

    /// Judge a connection and produce user guidance
    pub fn explain(source: StepType, target: StepType) -> ConnectionVerdict {
        if !Self::allows(source, target) {
            let message = GUIDANCE
                .iter()
                .find(|(from, _)| *from == source)
                .map(|(_, text)| text.to_string())
                .unwrap_or_else(|| format!("Cannot connect {} to {}", source, target));
            return ConnectionVerdict {
                accepted: false,
                severity: Severity::Rejected,
                message,
            };
        }

        match DISCOURAGED
            .iter()
            .find(|(from, to, _)| *from == source && *to == target)
        {
            Some((_, _, warning)) => ConnectionVerdict {
                accepted: true,
                severity: Severity::Discouraged,
                message: warning.to_string(),
            },
            None => ConnectionVerdict {
                accepted: true,
                severity: Severity::Recommended,
                message: format!("{} → {}", source, target),
            },
        }
    }
}
