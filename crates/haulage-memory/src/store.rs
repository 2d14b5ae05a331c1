use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use haulage_core::error::{HaulageError, Result};
use haulage_core::traits::{MemoryStore, StateMutator};
use haulage_core::types::{MemoryRecord, MutationKind};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS agent_memory (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS applied_decisions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        subject_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        applied_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_decisions_subject
        ON applied_decisions(subject_id, id);";

/// A decision written to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedDecision {
    pub kind: String,
    pub subject_id: String,
    pub payload: serde_json::Value,
    pub applied_at: DateTime<Utc>,
}

/// SQLite-backed memory store and decision ledger.
///
/// The ledger stands in for the operational database: every agent mutation
/// is appended as one row.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HaulageError::Database(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| HaulageError::Database(e.to_string()))?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| HaulageError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| HaulageError::Database(e.to_string()))?;

        debug!(path = %path.display(), "SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| HaulageError::Database(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| HaulageError::Database(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Ledger entries for a subject, oldest first.
    pub fn decisions_for(&self, subject_id: &str) -> Result<Vec<AppliedDecision>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| HaulageError::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT kind, subject_id, payload, applied_at FROM applied_decisions
                 WHERE subject_id = ?1
                 ORDER BY id ASC",
            )
            .map_err(|e| HaulageError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![subject_id], |row| {
                let kind: String = row.get(0)?;
                let subject_id: String = row.get(1)?;
                let payload: String = row.get(2)?;
                let ts_str: String = row.get(3)?;
                Ok((kind, subject_id, payload, ts_str))
            })
            .map_err(|e| HaulageError::Database(e.to_string()))?;

        let mut decisions = Vec::new();
        for row in rows {
            let (kind, subject_id, payload, ts_str) =
                row.map_err(|e| HaulageError::Database(e.to_string()))?;
            decisions.push(AppliedDecision {
                kind,
                subject_id,
                payload: serde_json::from_str(&payload)?,
                applied_at: parse_timestamp(&ts_str),
            });
        }

        Ok(decisions)
    }
}

pub(crate) fn parse_timestamp(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl MemoryStore for SqliteStore {
    fn set(&self, key: &str, value: &serde_json::Value) -> BoxFuture<'_, Result<()>> {
        let key = key.to_string();
        let value = value.to_string();

        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| HaulageError::Memory(e.to_string()))?;

            conn.execute(
                "INSERT INTO agent_memory (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(|e| HaulageError::Memory(e.to_string()))?;

            Ok(())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<MemoryRecord>>> {
        let key = key.to_string();

        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| HaulageError::Memory(e.to_string()))?;

            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT value, updated_at FROM agent_memory WHERE key = ?1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|e| HaulageError::Memory(e.to_string()))?;

            match row {
                Some((value, ts_str)) => Ok(Some(MemoryRecord {
                    value: serde_json::from_str(&value)?,
                    updated_at: parse_timestamp(&ts_str),
                })),
                None => Ok(None),
            }
        })
    }
}

impl StateMutator for SqliteStore {
    fn apply(
        &self,
        kind: MutationKind,
        subject_id: &str,
        payload: &serde_json::Value,
    ) -> BoxFuture<'_, Result<()>> {
        let subject_id = subject_id.to_string();
        let payload = payload.to_string();

        Box::pin(async move {
            let conn = self.conn.lock().map_err(|e| HaulageError::Mutation {
                kind: kind.to_string(),
                message: e.to_string(),
            })?;

            conn.execute(
                "INSERT INTO applied_decisions (kind, subject_id, payload, applied_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![kind.as_str(), subject_id, payload, Utc::now().to_rfc3339()],
            )
            .map_err(|e| HaulageError::Mutation {
                kind: kind.to_string(),
                message: e.to_string(),
            })?;

            debug!(kind = %kind, subject_id = %subject_id, "Decision applied");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_set_and_get() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .set("Compliance AI:SHP-100", &json!({"doc": "missing_invoice"}))
            .await
            .unwrap();

        let record = store.get("Compliance AI:SHP-100").await.unwrap().unwrap();
        assert_eq!(record.value, json!({"doc": "missing_invoice"}));
    }

    #[tokio::test]
    async fn test_memory_last_write_wins() {
        let store = SqliteStore::in_memory().unwrap();
        store.set("k", &json!({"a": 1})).await.unwrap();
        store.set("k", &json!({"b": 2})).await.unwrap();

        let record = store.get("k").await.unwrap().unwrap();
        // Overwritten, not merged.
        assert_eq!(record.value, json!({"b": 2}));
    }

    #[tokio::test]
    async fn test_memory_missing_key() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ledger_appends() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .apply(MutationKind::ScheduleMaintenance, "EQ-7", &json!(85))
            .await
            .unwrap();
        store
            .apply(MutationKind::UpdateInventory, "SKU-1", &json!({"stock": 40}))
            .await
            .unwrap();

        let decisions = store.decisions_for("EQ-7").unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].kind, "schedule_maintenance");
        assert_eq!(decisions[0].payload, json!(85));
        assert!(store.decisions_for("EQ-8").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("haulage.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("Shipment AI:SHP-1", &json!("route-b")).await.unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        let record = reopened.get("Shipment AI:SHP-1").await.unwrap().unwrap();
        assert_eq!(record.value, json!("route-b"));
    }
}
