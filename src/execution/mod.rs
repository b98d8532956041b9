//! Pipeline run coordination

pub mod coordinator;
pub mod error;
pub mod reconciler;
pub mod sanitizer;

pub use coordinator::{
    CoordinatorConfig, ExecutionCoordinator, RunEvent, RunEventHandler, RunSummary,
};
pub use error::RunError;
pub use reconciler::{NodeContentReconciler, CONTENT_KEY};
pub use sanitizer::{PromptGuard, PromptHistory, Rejection};
