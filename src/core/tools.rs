//! Tool configuration carried by agent steps
//!
//! An agent node stores its tools under `data.tools` as a map from tool id to a
//! tagged [`ToolConfig`]. Each variant has a matching patch type; applying a
//! patch never touches fields the patch leaves unset.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Data key holding the tool map on agent nodes
pub const TOOLS_KEY: &str = "tools";

/// Error types for tool configuration updates
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("Tool '{tool_id}' is a {actual} tool, cannot apply a {patch} update")]
    KindMismatch {
        tool_id: String,
        actual: &'static str,
        patch: &'static str,
    },

    #[error("Tool '{tool_id}' does not exist; only a full variant update can create it")]
    Missing { tool_id: String },

    #[error("Invalid tool configuration: {0}")]
    Invalid(String),
}

/// Configuration of a single tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolConfig {
    /// Text-to-SQL over a semantic model
    Analyst(AnalystTool),
    /// Retrieval over a search service
    Search(SearchTool),
    /// Direct SQL execution
    Sql(SqlTool),
    /// User-defined tool from the tool builder
    Custom(CustomTool),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalystTool {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTool {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
}

impl Default for SearchTool {
    fn default() -> Self {
        Self {
            enabled: false,
            search_service_name: None,
            database: None,
            schema: None,
            limit: default_search_limit(),
        }
    }
}

fn default_search_limit() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlTool {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(default = "default_max_rows")]
    pub max_rows: u32,
}

impl Default for SqlTool {
    fn default() -> Self {
        Self {
            enabled: false,
            warehouse: None,
            max_rows: default_max_rows(),
        }
    }
}

fn default_max_rows() -> u32 {
    100
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTool {
    #[serde(default)]
    pub enabled: bool,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update for an analyst tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalystPatch {
    pub enabled: Option<bool>,
    pub semantic_model: Option<Option<String>>,
}

/// Partial update for a search tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPatch {
    pub enabled: Option<bool>,
    pub search_service_name: Option<Option<String>>,
    pub database: Option<Option<String>>,
    pub schema: Option<Option<String>>,
    pub limit: Option<u32>,
}

/// Partial update for a SQL tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlPatch {
    pub enabled: Option<bool>,
    pub warehouse: Option<Option<String>>,
    pub max_rows: Option<u32>,
}

/// Partial update for a custom tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomPatch {
    pub enabled: Option<bool>,
    pub name: Option<String>,
    pub endpoint: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

/// An update aimed at one tool
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPatch {
    /// Toggle any tool, whatever its kind
    Enabled(bool),
    Analyst(AnalystPatch),
    Search(SearchPatch),
    Sql(SqlPatch),
    Custom(CustomPatch),
}

impl ToolPatch {
    fn kind(&self) -> &'static str {
        match self {
            ToolPatch::Enabled(_) => "enabled",
            ToolPatch::Analyst(_) => "analyst",
            ToolPatch::Search(_) => "search",
            ToolPatch::Sql(_) => "sql",
            ToolPatch::Custom(_) => "custom",
        }
    }

    /// Fresh tool of the variant this patch targets, if it targets one
    fn seed(&self) -> Option<ToolConfig> {
        match self {
            ToolPatch::Enabled(_) => None,
            ToolPatch::Analyst(_) => Some(ToolConfig::Analyst(AnalystTool::default())),
            ToolPatch::Search(_) => Some(ToolConfig::Search(SearchTool::default())),
            ToolPatch::Sql(_) => Some(ToolConfig::Sql(SqlTool::default())),
            ToolPatch::Custom(p) => Some(ToolConfig::Custom(CustomTool {
                name: p.name.clone().unwrap_or_default(),
                ..CustomTool::default()
            })),
        }
    }
}

impl AnalystTool {
    pub fn apply(&mut self, patch: &AnalystPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(model) = &patch.semantic_model {
            self.semantic_model = model.clone();
        }
    }
}

impl SearchTool {
    pub fn apply(&mut self, patch: &SearchPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(name) = &patch.search_service_name {
            self.search_service_name = name.clone();
        }
        if let Some(database) = &patch.database {
            self.database = database.clone();
        }
        if let Some(schema) = &patch.schema {
            self.schema = schema.clone();
        }
        if let Some(limit) = patch.limit {
            self.limit = limit;
        }
    }
}

impl SqlTool {
    pub fn apply(&mut self, patch: &SqlPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(warehouse) = &patch.warehouse {
            self.warehouse = warehouse.clone();
        }
        if let Some(max_rows) = patch.max_rows {
            self.max_rows = max_rows;
        }
    }
}

impl CustomTool {
    pub fn apply(&mut self, patch: &CustomPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(endpoint) = &patch.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
    }
}

impl ToolConfig {
    /// Variant name, as written in the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            ToolConfig::Analyst(_) => "analyst",
            ToolConfig::Search(_) => "search",
            ToolConfig::Sql(_) => "sql",
            ToolConfig::Custom(_) => "custom",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            ToolConfig::Analyst(t) => t.enabled,
            ToolConfig::Search(t) => t.enabled,
            ToolConfig::Sql(t) => t.enabled,
            ToolConfig::Custom(t) => t.enabled,
        }
    }

    /// Apply a patch through the variant's own update function
    pub fn apply(&mut self, tool_id: &str, patch: &ToolPatch) -> Result<(), ToolError> {
        match (self, patch) {
            (ToolConfig::Analyst(t), ToolPatch::Enabled(on)) => t.enabled = *on,
            (ToolConfig::Search(t), ToolPatch::Enabled(on)) => t.enabled = *on,
            (ToolConfig::Sql(t), ToolPatch::Enabled(on)) => t.enabled = *on,
            (ToolConfig::Custom(t), ToolPatch::Enabled(on)) => t.enabled = *on,
            (ToolConfig::Analyst(t), ToolPatch::Analyst(p)) => t.apply(p),
            (ToolConfig::Search(t), ToolPatch::Search(p)) => t.apply(p),
            (ToolConfig::Sql(t), ToolPatch::Sql(p)) => t.apply(p),
            (ToolConfig::Custom(t), ToolPatch::Custom(p)) => t.apply(p),
            (tool, patch) => {
                return Err(ToolError::KindMismatch {
                    tool_id: tool_id.to_string(),
                    actual: tool.kind(),
                    patch: patch.kind(),
                })
            }
        }
        Ok(())
    }
}

/// The tools configured on one agent node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolSet(pub BTreeMap<String, ToolConfig>);

impl ToolSet {
    /// Read the tool map from a node's `tools` value
    ///
    /// A missing value, or the legacy list-of-names format, yields an empty set.
    pub fn from_value(value: Option<&Value>) -> Result<Self, ToolError> {
        match value {
            None | Some(Value::Null) | Some(Value::Array(_)) => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ToolError::Invalid(e.to_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn get(&self, tool_id: &str) -> Option<&ToolConfig> {
        self.0.get(tool_id)
    }

    /// Apply a patch to one tool, creating it when the patch names a variant
    pub fn apply(&mut self, tool_id: &str, patch: &ToolPatch) -> Result<(), ToolError> {
        if !self.0.contains_key(tool_id) {
            let seed = patch.seed().ok_or_else(|| ToolError::Missing {
                tool_id: tool_id.to_string(),
            })?;
            self.0.insert(tool_id.to_string(), seed);
        }
        match self.0.get_mut(tool_id) {
            Some(tool) => tool.apply(tool_id, patch),
            None => Err(ToolError::Missing {
                tool_id: tool_id.to_string(),
            }),
        }
    }

    /// Ids of enabled tools
    pub fn enabled(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, tool)| tool.is_enabled())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}
