//! Core domain models for snowflow
//!
//! This module defines the fundamental data structures that represent
//! pipelines, steps, tool configuration, and run progress.

pub mod document;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod tools;

pub use document::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
pub use tools::{ToolConfig, ToolError, ToolPatch, ToolSet};
