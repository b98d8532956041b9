//! snowflow - Build, validate and run typed AI data pipelines

pub mod cli;
pub mod core;
pub mod engine;
pub mod execution;
pub mod graph;
pub mod persistence;

// Re-export commonly used types
pub use core::{Edge, Node, NodeRunState, Pipeline, PipelineDocument, Position, RunSnapshot, RunState, StepType};
pub use engine::{EngineClient, EngineClientConfig, EngineError, EngineEvent, HttpEngineClient, RunRequest};
pub use execution::{CoordinatorConfig, ExecutionCoordinator, RunError, RunEvent, RunSummary};
pub use graph::{preflight, ConnectionValidator, GraphError, GraphStore, PreflightReport, SharedGraph};
