use futures::future::BoxFuture;

use haulage_core::types::{MutationKind, Outcome, OutcomeStatus, Stage};

use super::{predict_apply_remember, AgentDeps, DecisionAgent};

/// Resolves missing shipment documentation.
///
/// Its predictor is usually a [`RetrievalPredictor`](crate::RetrievalPredictor)
/// over the compliance corpus; the prediction is stored on the shipment as its
/// compliance fix.
pub struct ComplianceAgent {
    deps: AgentDeps,
}

impl ComplianceAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

impl DecisionAgent for ComplianceAgent {
    fn stage(&self) -> Stage {
        Stage::Compliance
    }

    fn execute<'a>(&'a self, subject_id: &'a str) -> BoxFuture<'a, Outcome> {
        Box::pin(predict_apply_remember(
            &self.deps,
            Stage::Compliance,
            MutationKind::UpdateShipmentCompliance,
            OutcomeStatus::Fixed,
            subject_id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::CallEnvelope;
    use haulage_memory::AgentMemory;
    use haulage_test_utils::{InMemoryMemoryStore, MockMutator, MockPredictor};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_missing_invoice_is_fixed_and_remembered() {
        let predictor = Arc::new(MockPredictor::returning(
            "compliance",
            json!({"doc": "missing_invoice"}),
        ));
        let mutator = Arc::new(MockMutator::new());
        let store = Arc::new(InMemoryMemoryStore::new());
        let agent = ComplianceAgent::new(AgentDeps::new(
            predictor.clone(),
            mutator.clone(),
            AgentMemory::new(store.clone()),
            CallEnvelope::no_retry(Duration::from_secs(1)),
        ));

        let outcome = agent.execute("SHP-100").await;
        assert_eq!(outcome.status, OutcomeStatus::Fixed);
        assert_eq!(outcome.subject_id, "SHP-100");
        assert_eq!(
            store.value("Compliance AI:SHP-100"),
            Some(json!({"doc": "missing_invoice"}))
        );

        let applied = mutator.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].kind, MutationKind::UpdateShipmentCompliance);
        assert_eq!(applied[0].subject_id, "SHP-100");
        assert_eq!(predictor.calls(), 1);
    }

    #[tokio::test]
    async fn test_mutation_failure_is_error_outcome() {
        let store = Arc::new(InMemoryMemoryStore::new());
        let agent = ComplianceAgent::new(AgentDeps::new(
            Arc::new(MockPredictor::returning("compliance", json!([]))),
            Arc::new(MockMutator::failing()),
            AgentMemory::new(store.clone()),
            CallEnvelope::no_retry(Duration::from_secs(1)),
        ));

        let outcome = agent.execute("SHP-100").await;
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(store.is_empty());
    }
}
