//! SQLite-based persistence store

use crate::core::Pipeline;
use crate::persistence::{AuditEvent, PersistedState, PersistenceBackend, PipelineSummary, ToolDefinition};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

/// SQLite store for pipelines, tools and audit events
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;
        Self::with_pool(pool).await
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("snowflow");
        std::fs::create_dir_all(&db_dir)
            .with_context(|| format!("Failed to create {}", db_dir.display()))?;

        let db_path = db_dir.join("snowflow.db");
        debug!("Using database at {}", db_path.display());
        Self::new(db_path).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pipelines (
                name TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                node_count INTEGER NOT NULL DEFAULT 0,
                edge_count INTEGER NOT NULL DEFAULT 0,
                saved_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tools (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                definition TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS audit_events (
                id TEXT PRIMARY KEY,
                seq INTEGER NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                entity_name TEXT NOT NULL,
                details TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tools_created_at ON tools(created_at);
            CREATE INDEX IF NOT EXISTS idx_audit_seq ON audit_events(seq);
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize schema")?;

        Ok(())
    }

    /// Convert DateTime<Utc> to NaiveDateTime for SQLite
    fn to_naive(dt: DateTime<Utc>) -> NaiveDateTime {
        dt.naive_utc()
    }

    /// Convert NaiveDateTime to DateTime<Utc>
    fn from_naive(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn pipeline_from_row(row: &SqliteRow) -> Result<Pipeline> {
        let document: String = row.get("document");
        serde_json::from_str(&document).context("Corrupt pipeline document")
    }

    fn tool_from_row(row: &SqliteRow) -> Result<ToolDefinition> {
        let definition: String = row.get("definition");
        serde_json::from_str(&definition).context("Corrupt tool definition")
    }

    fn event_from_row(row: &SqliteRow) -> Result<AuditEvent> {
        let details: String = row.get("details");
        Ok(AuditEvent {
            id: Uuid::parse_str(&row.get::<String, _>("id"))?,
            action: row.get("action"),
            entity_type: row.get("entity_type"),
            entity_id: row.get("entity_id"),
            entity_name: row.get("entity_name"),
            details: serde_json::from_str(&details).context("Corrupt audit details")?,
            created_at: Self::from_naive(row.get("created_at")),
        })
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for SqliteStore {
    async fn save_pipeline(&self, pipeline: &Pipeline) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO pipelines (name, document, node_count, edge_count, saved_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&pipeline.name)
        .bind(serde_json::to_string(pipeline)?)
        .bind(pipeline.nodes.len() as i64)
        .bind(pipeline.edges.len() as i64)
        .bind(Self::to_naive(Utc::now()))
        .execute(&self.pool)
        .await
        .context("Failed to save pipeline")?;

        Ok(())
    }

    async fn load_pipeline(&self, name: &str) -> Result<Option<Pipeline>> {
        let row = sqlx::query("SELECT document FROM pipelines WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load pipeline")?;

        row.as_ref().map(Self::pipeline_from_row).transpose()
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT name, node_count, edge_count, saved_at
            FROM pipelines
            ORDER BY name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list pipelines")?;

        Ok(rows
            .iter()
            .map(|row| PipelineSummary {
                name: row.get("name"),
                node_count: row.get::<i64, _>("node_count") as usize,
                edge_count: row.get::<i64, _>("edge_count") as usize,
                saved_at: Self::from_naive(row.get("saved_at")),
            })
            .collect())
    }

    async fn delete_pipeline(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pipelines WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await
            .context("Failed to delete pipeline")?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_tool(&self, tool: &ToolDefinition) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO tools (id, name, definition, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&tool.id)
        .bind(&tool.name)
        .bind(serde_json::to_string(tool)?)
        .bind(Self::to_naive(tool.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to save tool")?;

        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        let rows = sqlx::query("SELECT definition FROM tools ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list tools")?;

        rows.iter().map(Self::tool_from_row).collect()
    }

    async fn delete_tool(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tools WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete tool")?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_event(&self, event: &AuditEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events
            (id, seq, action, entity_type, entity_id, entity_name, details, created_at)
            VALUES (?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM audit_events), ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(event.id.to_string())
        .bind(&event.action)
        .bind(&event.entity_type)
        .bind(&event.entity_id)
        .bind(&event.entity_name)
        .bind(serde_json::to_string(&event.details)?)
        .bind(Self::to_naive(event.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to record audit event")?;

        Ok(())
    }

    async fn list_events(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, action, entity_type, entity_id, entity_name, details, created_at
            FROM audit_events
            ORDER BY seq DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list audit events")?;

        rows.iter().map(Self::event_from_row).collect()
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["pipelines", "tools", "audit_events"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to clear {}", table))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<PersistedState> {
        let rows = sqlx::query("SELECT document FROM pipelines ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load pipelines")?;
        let pipelines = rows.iter().map(Self::pipeline_from_row).collect::<Result<Vec<_>>>()?;

        let rows = sqlx::query(
            r#"
            SELECT id, action, entity_type, entity_id, entity_name, details, created_at
            FROM audit_events
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load audit events")?;
        let events = rows.iter().map(Self::event_from_row).collect::<Result<Vec<_>>>()?;

        Ok(PersistedState {
            pipelines,
            tools: self.list_tools().await?,
            events,
        })
    }
}
