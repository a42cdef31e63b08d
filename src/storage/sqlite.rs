//! SQLite store implementation

use super::{
    ChangeSet, ConversionStore, GraphRepository, IssueConversionInformation,
    TimelineItemConversionInformation, WalkerPriorityStore,
};
use crate::graph::{IssueGraph, IssueId, Node, TimelineItemId};
use crate::walker::CursorResourceWalkerData;
use crate::{ArchSyncError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to SQLite database file
    pub path: PathBuf,

    /// Enable WAL mode for better concurrency
    pub wal_mode: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("archsync");
        path.push("archsync.db");

        Self {
            path,
            wal_mode: true,
        }
    }
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// SQLite-backed conversion, walker and node store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create a store database
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %config.path.display(), "Opening sync store");

        let conn = Connection::open(&config.path)?;
        if config.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(config.path.clone()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ArchSyncError::Storage("store connection mutex poisoned".to_string()))
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS issue_conversions (
                source_id TEXT NOT NULL,
                external_id TEXT NOT NULL,
                issue_id TEXT,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS timeline_conversions (
                source_id TEXT NOT NULL,
                external_id TEXT,
                timeline_item_id TEXT,
                kind TEXT NOT NULL,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS walker_priorities (
                source_id TEXT NOT NULL,
                resource_name TEXT NOT NULL,
                current_priority REAL NOT NULL,
                PRIMARY KEY (source_id, resource_name)
            );

            CREATE TABLE IF NOT EXISTS nodes (
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (kind, id)
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_issue_conv_external
                ON issue_conversions(source_id, external_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_issue_conv_issue
                ON issue_conversions(source_id, issue_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_timeline_conv_external
                ON timeline_conversions(source_id, external_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_timeline_conv_item
                ON timeline_conversions(source_id, timeline_item_id);
            CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);
            "#,
        )?;

        Ok(())
    }

    /// Row counts for diagnostics
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;
        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            issue_conversions: count("issue_conversions")?,
            timeline_conversions: count("timeline_conversions")?,
            walkers: count("walker_priorities")?,
            nodes: count("nodes")?,
        })
    }

    /// Get the database path (None for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub issue_conversions: usize,
    pub timeline_conversions: usize,
    pub walkers: usize,
    pub nodes: usize,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn issue_conversion_from_row(row: &Row<'_>) -> rusqlite::Result<(IssueConversionInformation, String)> {
    let issue_id: Option<String> = row.get(2)?;
    Ok((
        IssueConversionInformation {
            source_id: row.get(0)?,
            external_id: row.get(1)?,
            issue_id: issue_id.map(IssueId::new),
            data: serde_json::Value::Null,
        },
        row.get(3)?,
    ))
}

fn timeline_conversion_from_row(
    row: &Row<'_>,
) -> rusqlite::Result<(TimelineItemConversionInformation, String)> {
    let item: Option<String> = row.get(2)?;
    Ok((
        TimelineItemConversionInformation {
            source_id: row.get(0)?,
            external_id: row.get(1)?,
            timeline_item_id: item.map(TimelineItemId::new),
            kind: row.get(3)?,
            data: serde_json::Value::Null,
        },
        row.get(4)?,
    ))
}

fn with_issue_data(
    (mut info, data): (IssueConversionInformation, String),
) -> Result<IssueConversionInformation> {
    info.data = serde_json::from_str(&data)?;
    Ok(info)
}

fn with_timeline_data(
    (mut info, data): (TimelineItemConversionInformation, String),
) -> Result<TimelineItemConversionInformation> {
    info.data = serde_json::from_str(&data)?;
    Ok(info)
}

const ISSUE_CONVERSION_COLUMNS: &str = "source_id, external_id, issue_id, data";
const TIMELINE_CONVERSION_COLUMNS: &str = "source_id, external_id, timeline_item_id, kind, data";

#[async_trait]
impl ConversionStore for SqliteStore {
    async fn issue_conversion_by_external(
        &self,
        source_id: &str,
        external_id: &str,
    ) -> Result<Option<IssueConversionInformation>> {
        let row = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {} FROM issue_conversions WHERE source_id = ? AND external_id = ?",
                    ISSUE_CONVERSION_COLUMNS
                ),
                params![source_id, external_id],
                issue_conversion_from_row,
            )
            .optional()?;
        row.map(with_issue_data).transpose()
    }

    async fn issue_conversion_by_issue(
        &self,
        source_id: &str,
        issue: &IssueId,
    ) -> Result<Option<IssueConversionInformation>> {
        let row = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {} FROM issue_conversions WHERE source_id = ? AND issue_id = ?",
                    ISSUE_CONVERSION_COLUMNS
                ),
                params![source_id, issue.as_str()],
                issue_conversion_from_row,
            )
            .optional()?;
        row.map(with_issue_data).transpose()
    }

    async fn save_issue_conversion(&self, info: &IssueConversionInformation) -> Result<()> {
        let data = serde_json::to_string(&info.data)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let Some(issue_id) = &info.issue_id {
            let holder: Option<String> = tx
                .query_row(
                    "SELECT external_id FROM issue_conversions WHERE source_id = ?1 AND issue_id = ?2",
                    params![&info.source_id, issue_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(holder) = holder.filter(|holder| holder != &info.external_id) {
                return Err(ArchSyncError::Invariant(format!(
                    "Issue {} is already mapped to {} in {}, refusing to map {}",
                    issue_id, holder, info.source_id, info.external_id
                )));
            }
        }

        tx.execute(
            "DELETE FROM issue_conversions WHERE source_id = ?1 AND (external_id = ?2 OR issue_id = ?3)",
            params![
                &info.source_id,
                &info.external_id,
                info.issue_id.as_ref().map(|id| id.as_str())
            ],
        )?;
        tx.execute(
            "INSERT INTO issue_conversions (source_id, external_id, issue_id, data, updated_at) VALUES (?, ?, ?, ?, ?)",
            params![
                &info.source_id,
                &info.external_id,
                info.issue_id.as_ref().map(|id| id.as_str()),
                data,
                now_millis()
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    async fn list_issue_conversions(
        &self,
        source_id: &str,
    ) -> Result<Vec<IssueConversionInformation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM issue_conversions WHERE source_id = ? ORDER BY external_id",
            ISSUE_CONVERSION_COLUMNS
        ))?;
        let rows = stmt.query_map([source_id], issue_conversion_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(with_issue_data(row?)?);
        }
        Ok(result)
    }

    async fn timeline_conversion_by_external(
        &self,
        source_id: &str,
        external_id: &str,
    ) -> Result<Option<TimelineItemConversionInformation>> {
        let row = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {} FROM timeline_conversions WHERE source_id = ? AND external_id = ?",
                    TIMELINE_CONVERSION_COLUMNS
                ),
                params![source_id, external_id],
                timeline_conversion_from_row,
            )
            .optional()?;
        row.map(with_timeline_data).transpose()
    }

    async fn timeline_conversion_by_item(
        &self,
        source_id: &str,
        item: &TimelineItemId,
    ) -> Result<Option<TimelineItemConversionInformation>> {
        let row = self
            .conn()?
            .query_row(
                &format!(
                    "SELECT {} FROM timeline_conversions WHERE source_id = ? AND timeline_item_id = ?",
                    TIMELINE_CONVERSION_COLUMNS
                ),
                params![source_id, item.as_str()],
                timeline_conversion_from_row,
            )
            .optional()?;
        row.map(with_timeline_data).transpose()
    }

    async fn save_timeline_conversion(
        &self,
        info: &TimelineItemConversionInformation,
    ) -> Result<()> {
        let data = serde_json::to_string(&info.data)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // NULL never compares equal, so records lacking one key only collide on the other
        tx.execute(
            "DELETE FROM timeline_conversions WHERE source_id = ?1 AND (external_id = ?2 OR timeline_item_id = ?3)",
            params![
                &info.source_id,
                info.external_id.as_deref(),
                info.timeline_item_id.as_ref().map(|id| id.as_str())
            ],
        )?;
        tx.execute(
            "INSERT INTO timeline_conversions (source_id, external_id, timeline_item_id, kind, data, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                &info.source_id,
                info.external_id.as_deref(),
                info.timeline_item_id.as_ref().map(|id| id.as_str()),
                &info.kind,
                data,
                now_millis()
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl WalkerPriorityStore for SqliteStore {
    async fn walker_priority(&self, source_id: &str, resource_name: &str) -> Result<Option<f64>> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT current_priority FROM walker_priorities WHERE source_id = ? AND resource_name = ?",
                params![source_id, resource_name],
                |row| row.get(0),
            )
            .optional()?)
    }

    async fn set_walker_priority(&self, data: &CursorResourceWalkerData) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO walker_priorities (source_id, resource_name, current_priority) VALUES (?, ?, ?)",
            params![&data.source_id, &data.resource_name, data.current_priority],
        )?;
        Ok(())
    }

    async fn list_walker_priorities(
        &self,
        source_id: &str,
    ) -> Result<Vec<CursorResourceWalkerData>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT source_id, resource_name, current_priority FROM walker_priorities WHERE source_id = ? ORDER BY current_priority, resource_name",
        )?;
        let rows = stmt.query_map([source_id], |row| {
            Ok(CursorResourceWalkerData {
                source_id: row.get(0)?,
                resource_name: row.get(1)?,
                current_priority: row.get(2)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

#[async_trait]
impl GraphRepository for SqliteStore {
    async fn save(&self, changes: ChangeSet) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            updated = changes.updated.len(),
            deleted = changes.deleted.len(),
            "Saving graph changes"
        );

        let now = now_millis();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for node in &changes.updated {
            let node_ref = node.node_ref();
            tx.execute(
                "INSERT OR REPLACE INTO nodes (kind, id, body, updated_at) VALUES (?, ?, ?, ?)",
                params![
                    node_ref.kind(),
                    node_ref.id_str(),
                    serde_json::to_string(node)?,
                    now
                ],
            )?;
        }
        for node_ref in &changes.deleted {
            tx.execute(
                "DELETE FROM nodes WHERE kind = ? AND id = ?",
                params![node_ref.kind(), node_ref.id_str()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn load_graph(&self) -> Result<IssueGraph> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT body FROM nodes")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(serde_json::from_str::<Node>(&row?)?);
        }

        let graph = IssueGraph::from_nodes(nodes);
        tracing::info!(nodes = graph.len(), "Graph loaded from store");
        Ok(graph)
    }
}
