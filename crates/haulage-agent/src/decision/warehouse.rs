use futures::future::BoxFuture;

use haulage_core::types::{MutationKind, Outcome, OutcomeStatus, Stage};

use super::{predict_apply_remember, AgentDeps, DecisionAgent};

/// Rebalances stock for a product.
pub struct WarehouseAgent {
    deps: AgentDeps,
}

impl WarehouseAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

impl DecisionAgent for WarehouseAgent {
    fn stage(&self) -> Stage {
        Stage::Warehouse
    }

    fn execute<'a>(&'a self, subject_id: &'a str) -> BoxFuture<'a, Outcome> {
        Box::pin(predict_apply_remember(
            &self.deps,
            Stage::Warehouse,
            MutationKind::UpdateInventory,
            OutcomeStatus::Optimized,
            subject_id,
        ))
    }
}
