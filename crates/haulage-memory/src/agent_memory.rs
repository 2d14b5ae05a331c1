use std::sync::Arc;

use tracing::{debug, warn};

use haulage_core::traits::MemoryStore;
use haulage_core::types::{memory_key, MemoryRecord};

/// Advisory log of agent decisions, namespaced `agent:key`.
///
/// Store failures are logged and swallowed: a write that fails is a no-op and
/// a read that fails is absent. Nothing here can fail a workflow.
#[derive(Clone)]
pub struct AgentMemory {
    store: Arc<dyn MemoryStore>,
}

impl AgentMemory {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Overwrite the value for `(agent, key)`. Returns whether it was stored.
    pub async fn store(&self, agent: &str, key: &str, value: &serde_json::Value) -> bool {
        let namespaced = memory_key(agent, key);
        match self.store.set(&namespaced, value).await {
            Ok(()) => {
                debug!(key = %namespaced, "Memory stored");
                true
            }
            Err(e) => {
                warn!(key = %namespaced, error = %e, "Memory write failed, continuing");
                false
            }
        }
    }

    pub async fn retrieve(&self, agent: &str, key: &str) -> Option<serde_json::Value> {
        self.retrieve_record(agent, key).await.map(|r| r.value)
    }

    /// Value plus the time it was written.
    pub async fn retrieve_record(&self, agent: &str, key: &str) -> Option<MemoryRecord> {
        let namespaced = memory_key(agent, key);
        match self.store.get(&namespaced).await {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %namespaced, error = %e, "Memory read failed, treating as absent");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteStore;
    use futures::future::BoxFuture;
    use haulage_core::error::{HaulageError, Result};
    use serde_json::json;

    struct DownStore;

    impl MemoryStore for DownStore {
        fn set(&self, _key: &str, _value: &serde_json::Value) -> BoxFuture<'_, Result<()>> {
            Box::pin(async { Err(HaulageError::Memory("connection refused".into())) })
        }
        fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<MemoryRecord>>> {
            Box::pin(async { Err(HaulageError::Memory("connection refused".into())) })
        }
    }

    #[tokio::test]
    async fn test_store_and_retrieve_namespaced() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let memory = AgentMemory::new(store.clone());

        assert!(memory.store("Shipment AI", "SHP-1", &json!("route-b")).await);
        assert_eq!(
            memory.retrieve("Shipment AI", "SHP-1").await,
            Some(json!("route-b"))
        );
        assert_eq!(memory.retrieve("Warehouse AI", "SHP-1").await, None);

        let raw = store.get("Shipment AI:SHP-1").await.unwrap().unwrap();
        assert_eq!(raw.value, json!("route-b"));
    }

    #[tokio::test]
    async fn test_failures_degrade() {
        let memory = AgentMemory::new(Arc::new(DownStore));
        assert!(!memory.store("Compliance AI", "SHP-1", &json!({})).await);
        assert_eq!(memory.retrieve("Compliance AI", "SHP-1").await, None);
    }
}
