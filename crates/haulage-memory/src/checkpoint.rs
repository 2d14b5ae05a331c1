use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};

use haulage_core::error::{HaulageError, Result};
use haulage_core::traits::CheckpointStore;
use haulage_core::types::RunState;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS run_checkpoints (
        correlation_id TEXT PRIMARY KEY,
        state_json TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );";

/// Persistent run-state checkpoints backed by SQLite.
///
/// One row per correlation id; every save is a single upsert, so a reader
/// never observes a half-written state.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    /// Open or create the checkpoint database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HaulageError::Checkpoint(format!("Failed to create checkpoint directory: {}", e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            HaulageError::Checkpoint(format!("Failed to open checkpoint store: {}", e))
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| HaulageError::Checkpoint(e.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|e| {
            HaulageError::Checkpoint(format!("Failed to initialize checkpoint schema: {}", e))
        })?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory checkpoint store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| HaulageError::Checkpoint(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| HaulageError::Checkpoint(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Correlation ids of every stored run, most recently updated first.
    pub fn list(&self, limit: usize) -> Result<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| HaulageError::Checkpoint(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT correlation_id FROM run_checkpoints
                 ORDER BY updated_at DESC
                 LIMIT ?1",
            )
            .map_err(|e| HaulageError::Checkpoint(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))
            .map_err(|e| HaulageError::Checkpoint(e.to_string()))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|e| HaulageError::Checkpoint(e.to_string()))?);
        }
        Ok(ids)
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn save(&self, state: &RunState) -> BoxFuture<'_, Result<()>> {
        let correlation_id = state.correlation_id.clone();
        let state_json = serde_json::to_string(state);

        Box::pin(async move {
            let state_json = state_json?;
            let conn = self
                .conn
                .lock()
                .map_err(|e| HaulageError::Checkpoint(e.to_string()))?;

            conn.execute(
                "INSERT INTO run_checkpoints (correlation_id, state_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(correlation_id) DO UPDATE
                 SET state_json = excluded.state_json, updated_at = excluded.updated_at",
                params![correlation_id, state_json, Utc::now().to_rfc3339()],
            )
            .map_err(|e| HaulageError::Checkpoint(format!("Failed to save checkpoint: {}", e)))?;

            Ok(())
        })
    }

    fn load(&self, correlation_id: &str) -> BoxFuture<'_, Result<Option<RunState>>> {
        let correlation_id = correlation_id.to_string();

        Box::pin(async move {
            let conn = self
                .conn
                .lock()
                .map_err(|e| HaulageError::Checkpoint(e.to_string()))?;

            let json: Option<String> = conn
                .query_row(
                    "SELECT state_json FROM run_checkpoints WHERE correlation_id = ?1",
                    params![correlation_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| HaulageError::Checkpoint(format!("Failed to load checkpoint: {}", e)))?;

            match json {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haulage_core::types::{Stage, StageStatus, Subjects};

    #[tokio::test]
    async fn test_save_and_load() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let mut state = RunState::new("run-1", Subjects::uniform("SHP-1"));
        state.set_status(Stage::Compliance, StageStatus::Completed);

        store.save(&state).await.unwrap();

        let loaded = store.load("run-1").await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_save_overwrites_same_run() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let mut state = RunState::new("run-1", Subjects::uniform("SHP-1"));
        store.save(&state).await.unwrap();

        state.set_status(Stage::Shipment, StageStatus::Failed);
        store.save(&state).await.unwrap();

        let loaded = store.load("run-1").await.unwrap().unwrap();
        assert_eq!(loaded.status(Stage::Shipment), StageStatus::Failed);
        assert_eq!(store.list(10).unwrap(), vec!["run-1".to_string()]);
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        assert!(store.load("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resume_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");

        let mut state = RunState::new("run-disk", Subjects::uniform("EQ-7"));
        state.set_status(Stage::Compliance, StageStatus::Completed);
        {
            let store = SqliteCheckpointStore::open(&path).unwrap();
            store.save(&state).await.unwrap();
        }

        let store = SqliteCheckpointStore::open(&path).unwrap();
        let loaded = store.load("run-disk").await.unwrap().unwrap();
        assert_eq!(loaded.status(Stage::Compliance), StageStatus::Completed);
        assert_eq!(loaded.status(Stage::Maintenance), StageStatus::Pending);
    }
}
