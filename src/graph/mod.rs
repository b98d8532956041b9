//! Pipeline editing: the canonical store, connection rules and pre-flight checks

pub mod preflight;
pub mod store;
pub mod validator;

pub use preflight::{preflight, Issue, IssueSeverity, PreflightReport};
pub use store::{ChangeHandler, GraphChange, GraphError, GraphStore, IdGenerator};
pub use validator::{ConnectionValidator, ConnectionVerdict, Severity};

/// Store handle shared between editors and the execution coordinator
pub type SharedGraph = std::sync::Arc<tokio::sync::RwLock<GraphStore>>;

/// Wrap a store for sharing
pub fn shared(store: GraphStore) -> SharedGraph {
    std::sync::Arc::new(tokio::sync::RwLock::new(store))
}
