use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{Alert, MemoryRecord, MutationKind, RunState};

/// One decision model behind an agent.
pub trait Predictor: Send + Sync + 'static {
    /// Model name (used in logs and errors).
    fn name(&self) -> &str;

    /// Produce a decision payload for a subject.
    fn predict(&self, subject_id: &str) -> BoxFuture<'_, Result<serde_json::Value>>;
}

/// Applies an agent's decision to the operational store.
pub trait StateMutator: Send + Sync + 'static {
    fn apply(
        &self,
        kind: MutationKind,
        subject_id: &str,
        payload: &serde_json::Value,
    ) -> BoxFuture<'_, Result<()>>;
}

/// Durable control state for workflow runs.
pub trait CheckpointStore: Send + Sync + 'static {
    /// Upsert the run state under its correlation id.
    fn save(&self, state: &RunState) -> BoxFuture<'_, Result<()>>;

    /// Load the latest state for a correlation id.
    fn load(&self, correlation_id: &str) -> BoxFuture<'_, Result<Option<RunState>>>;
}

/// Last-write-wins key/value log.
pub trait MemoryStore: Send + Sync + 'static {
    fn set(&self, key: &str, value: &serde_json::Value) -> BoxFuture<'_, Result<()>>;

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<MemoryRecord>>>;
}

/// Outward alert channel. Fire-and-forget from the caller's view.
pub trait Notifier: Send + Sync + 'static {
    /// Channel name (e.g., "log", "webhook").
    fn name(&self) -> &str;

    fn notify(&self, alert: &Alert) -> BoxFuture<'_, Result<()>>;
}
