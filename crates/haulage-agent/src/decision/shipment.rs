use futures::future::BoxFuture;

use haulage_core::types::{MutationKind, Outcome, OutcomeStatus, Stage};

use super::{predict_apply_remember, AgentDeps, DecisionAgent};

/// Picks a new route for a shipment and records it.
pub struct ShipmentAgent {
    deps: AgentDeps,
}

impl ShipmentAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

impl DecisionAgent for ShipmentAgent {
    fn stage(&self) -> Stage {
        Stage::Shipment
    }

    fn execute<'a>(&'a self, subject_id: &'a str) -> BoxFuture<'a, Outcome> {
        Box::pin(predict_apply_remember(
            &self.deps,
            Stage::Shipment,
            MutationKind::UpdateShipmentRoute,
            OutcomeStatus::Rerouted,
            subject_id,
        ))
    }
}
