//! In-memory fakes for every collaborator trait, shared by the workspace's
//! unit and integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use futures::future::BoxFuture;

use haulage_core::error::{HaulageError, Result};
use haulage_core::traits::{CheckpointStore, MemoryStore, Notifier, Predictor, StateMutator};
use haulage_core::types::{Alert, MemoryRecord, MutationKind, RunState};
use haulage_retrieval::EmbeddingProvider;

/// Predictor with a swappable canned response. `None` means "fail".
pub struct MockPredictor {
    name: String,
    response: Mutex<Option<serde_json::Value>>,
    calls: AtomicUsize,
    subjects: Mutex<Vec<String>>,
}

impl MockPredictor {
    pub fn returning(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            response: Mutex::new(Some(value)),
            calls: AtomicUsize::new(0),
            subjects: Mutex::new(vec![]),
        }
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response: Mutex::new(None),
            calls: AtomicUsize::new(0),
            subjects: Mutex::new(vec![]),
        }
    }

    /// Replace the canned response (`None` to start failing).
    pub fn set_response(&self, value: Option<serde_json::Value>) {
        *self.response.lock().unwrap() = value;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Subjects passed to `predict`, in call order.
    pub fn subjects(&self) -> Vec<String> {
        self.subjects.lock().unwrap().clone()
    }
}

impl Predictor for MockPredictor {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, subject_id: &str) -> BoxFuture<'_, Result<serde_json::Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.subjects.lock().unwrap().push(subject_id.to_string());
        let response = self.response.lock().unwrap().clone();
        let model = self.name.clone();
        Box::pin(async move {
            response.ok_or_else(|| HaulageError::Predictor {
                model,
                message: "mock failure".into(),
            })
        })
    }
}

/// A mutation the [`MockMutator`] saw.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMutation {
    pub kind: MutationKind,
    pub subject_id: String,
    pub payload: serde_json::Value,
}

/// Records every mutation; can be told to fail.
#[derive(Default)]
pub struct MockMutator {
    applied: Mutex<Vec<RecordedMutation>>,
    fail: Mutex<bool>,
}

impl MockMutator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let m = Self::default();
        m.set_failing(true);
        m
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn applied(&self) -> Vec<RecordedMutation> {
        self.applied.lock().unwrap().clone()
    }

    pub fn applied_kind(&self, kind: MutationKind) -> Vec<RecordedMutation> {
        self.applied()
            .into_iter()
            .filter(|m| m.kind == kind)
            .collect()
    }
}

impl StateMutator for MockMutator {
    fn apply(
        &self,
        kind: MutationKind,
        subject_id: &str,
        payload: &serde_json::Value,
    ) -> BoxFuture<'_, Result<()>> {
        let result = if *self.fail.lock().unwrap() {
            Err(HaulageError::Mutation {
                kind: kind.to_string(),
                message: "mock failure".into(),
            })
        } else {
            self.applied.lock().unwrap().push(RecordedMutation {
                kind,
                subject_id: subject_id.to_string(),
                payload: payload.clone(),
            });
            Ok(())
        };
        Box::pin(async move { result })
    }
}

/// HashMap-backed memory store.
#[derive(Default)]
pub struct InMemoryMemoryStore {
    entries: Mutex<HashMap<String, MemoryRecord>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.lock().unwrap().get(key).map(|r| r.value.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MemoryStore for InMemoryMemoryStore {
    fn set(&self, key: &str, value: &serde_json::Value) -> BoxFuture<'_, Result<()>> {
        self.entries.lock().unwrap().insert(
            key.to_string(),
            MemoryRecord {
                value: value.clone(),
                updated_at: Utc::now(),
            },
        );
        Box::pin(async { Ok(()) })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<MemoryRecord>>> {
        let record = self.entries.lock().unwrap().get(key).cloned();
        Box::pin(async move { Ok(record) })
    }
}

/// Memory store whose every call fails.
pub struct FailingMemoryStore;

impl MemoryStore for FailingMemoryStore {
    fn set(&self, _key: &str, _value: &serde_json::Value) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Err(HaulageError::Memory("memory store unreachable".into())) })
    }

    fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<MemoryRecord>>> {
        Box::pin(async { Err(HaulageError::Memory("memory store unreachable".into())) })
    }
}

/// HashMap-backed checkpoint store that also keeps every saved snapshot.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    states: Mutex<HashMap<String, RunState>>,
    history: Mutex<Vec<RunState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every snapshot passed to `save`, in order.
    pub fn history(&self) -> Vec<RunState> {
        self.history.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    /// Seed a stored state directly.
    pub fn put(&self, state: RunState) {
        self.states
            .lock()
            .unwrap()
            .insert(state.correlation_id.clone(), state);
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn save(&self, state: &RunState) -> BoxFuture<'_, Result<()>> {
        self.states
            .lock()
            .unwrap()
            .insert(state.correlation_id.clone(), state.clone());
        self.history.lock().unwrap().push(state.clone());
        Box::pin(async { Ok(()) })
    }

    fn load(&self, correlation_id: &str) -> BoxFuture<'_, Result<Option<RunState>>> {
        let state = self.states.lock().unwrap().get(correlation_id).cloned();
        Box::pin(async move { Ok(state) })
    }
}

/// Checkpoint store whose every call fails.
pub struct FailingCheckpointStore;

impl CheckpointStore for FailingCheckpointStore {
    fn save(&self, _state: &RunState) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Err(HaulageError::Checkpoint("checkpoint store unreachable".into())) })
    }

    fn load(&self, _correlation_id: &str) -> BoxFuture<'_, Result<Option<RunState>>> {
        Box::pin(async { Err(HaulageError::Checkpoint("checkpoint store unreachable".into())) })
    }
}

/// Collects alerts.
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn notify(&self, alert: &Alert) -> BoxFuture<'_, Result<()>> {
        self.alerts.lock().unwrap().push(alert.clone());
        Box::pin(async { Ok(()) })
    }
}

/// Embedder that maps every query to the same vector, or fails.
pub struct MockEmbedder {
    vector: Option<Vec<f32>>,
    dimensions: usize,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn returning(vector: Vec<f32>) -> Self {
        Self {
            dimensions: vector.len(),
            vector: Some(vector),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every call while claiming `dimensions`-wide vectors.
    pub fn failing(dimensions: usize) -> Self {
        Self {
            vector: None,
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for MockEmbedder {
    fn embed_query<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = match &self.vector {
            Some(v) => Ok(v.clone()),
            None => Err(HaulageError::Embedding("mock embedder down".into())),
        };
        Box::pin(async move { result })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
