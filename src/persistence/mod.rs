//! Persistence layer for saved pipelines, custom tools and audit events

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteStore;

use crate::core::Pipeline;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Listing entry for a saved pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub name: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub saved_at: DateTime<Utc>,
}

impl PipelineSummary {
    pub fn of(pipeline: &Pipeline, saved_at: DateTime<Utc>) -> Self {
        Self {
            name: pipeline.name.clone(),
            node_count: pipeline.nodes.len(),
            edge_count: pipeline.edges.len(),
            saved_at,
        }
    }
}

/// A user-defined tool from the tool builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub tool_type: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub api_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ToolDefinition {
    /// New definition with a generated `tool-` id
    pub fn new(name: impl Into<String>, tool_type: impl Into<String>) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("tool-{}", &id[..8]),
            name: name.into(),
            description: String::new(),
            tool_type: tool_type.into(),
            parameters: Vec::new(),
            api_endpoint: None,
            api_method: None,
            created_at: Utc::now(),
        }
    }
}

/// A recorded user action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub entity_name: String,
    #[serde(default)]
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        entity_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            entity_name: entity_name.into(),
            details: Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Everything a backend holds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub pipelines: Vec<Pipeline>,
    pub tools: Vec<ToolDefinition>,
    pub events: Vec<AuditEvent>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a pipeline under its name, replacing any previous version
    async fn save_pipeline(&self, pipeline: &Pipeline) -> Result<()>;

    /// Load a pipeline by name
    async fn load_pipeline(&self, name: &str) -> Result<Option<Pipeline>>;

    /// List saved pipelines, sorted by name
    async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>>;

    /// Delete a pipeline; returns false if it did not exist
    async fn delete_pipeline(&self, name: &str) -> Result<bool>;

    /// Save a tool definition, replacing one with the same id
    async fn save_tool(&self, tool: &ToolDefinition) -> Result<()>;

    /// List tool definitions, newest first
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>>;

    /// Delete a tool; returns false if it did not exist
    async fn delete_tool(&self, id: &str) -> Result<bool>;

    /// Append an audit event
    async fn record_event(&self, event: &AuditEvent) -> Result<()>;

    /// Most recent audit events, newest first
    async fn list_events(&self, limit: usize) -> Result<Vec<AuditEvent>>;

    /// Remove everything
    async fn clear(&self) -> Result<()>;

    /// Load everything at once
    async fn load_all(&self) -> Result<PersistedState>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    pipelines: tokio::sync::RwLock<HashMap<String, (Pipeline, DateTime<Utc>)>>,
    tools: tokio::sync::RwLock<HashMap<String, ToolDefinition>>,
    events: tokio::sync::RwLock<Vec<AuditEvent>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            pipelines: tokio::sync::RwLock::new(HashMap::new()),
            tools: tokio::sync::RwLock::new(HashMap::new()),
            events: tokio::sync::RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_pipeline(&self, pipeline: &Pipeline) -> Result<()> {
        let mut pipelines = self.pipelines.write().await;
        pipelines.insert(pipeline.name.clone(), (pipeline.clone(), Utc::now()));
        Ok(())
    }

    async fn load_pipeline(&self, name: &str) -> Result<Option<Pipeline>> {
        let pipelines = self.pipelines.read().await;
        Ok(pipelines.get(name).map(|(p, _)| p.clone()))
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>> {
        let pipelines = self.pipelines.read().await;
        let mut result: Vec<_> = pipelines
            .values()
            .map(|(p, saved_at)| PipelineSummary::of(p, *saved_at))
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn delete_pipeline(&self, name: &str) -> Result<bool> {
        Ok(self.pipelines.write().await.remove(name).is_some())
    }

    async fn save_tool(&self, tool: &ToolDefinition) -> Result<()> {
        self.tools.write().await.insert(tool.id.clone(), tool.clone());
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        let tools = self.tools.read().await;
        let mut result: Vec<_> = tools.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn delete_tool(&self, id: &str) -> Result<bool> {
        Ok(self.tools.write().await.remove(id).is_some())
    }

    async fn record_event(&self, event: &AuditEvent) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn list_events(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let events = self.events.read().await;
        Ok(events.iter().rev().take(limit).cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.pipelines.write().await.clear();
        self.tools.write().await.clear();
        self.events.write().await.clear();
        Ok(())
    }

    async fn load_all(&self) -> Result<PersistedState> {
        let mut pipelines: Vec<Pipeline> = self
            .pipelines
            .read()
            .await
            .values()
            .map(|(p, _)| p.clone())
            .collect();
        pipelines.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(PersistedState {
            pipelines,
            tools: self.list_tools().await?,
            events: self.events.read().await.clone(),
        })
    }
}
