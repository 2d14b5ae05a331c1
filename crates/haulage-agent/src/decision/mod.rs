//! Decision agents, one per workflow stage.
//!
//! Every agent does the same three things for a subject: ask its predictor
//! for a decision, apply that decision through the state mutator, and record
//! it in agent memory under its own name. Predictor and mutation failures
//! (after the call envelope's retries) fold into an `error` outcome; they
//! never escape as `Err`.

pub mod compliance;
pub mod maintenance;
pub mod shipment;
pub mod warehouse;

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use haulage_core::error::Result;
use haulage_core::traits::{Predictor, StateMutator};
use haulage_core::types::{MutationKind, Outcome, OutcomeStatus, Stage};
use haulage_memory::AgentMemory;

use crate::envelope::CallEnvelope;

pub use compliance::ComplianceAgent;
pub use maintenance::MaintenanceAgent;
pub use shipment::ShipmentAgent;
pub use warehouse::WarehouseAgent;

/// A stage's decision maker.
pub trait DecisionAgent: Send + Sync + 'static {
    /// The stage this agent serves.
    fn stage(&self) -> Stage;

    /// Memory namespace of the agent.
    fn name(&self) -> &'static str {
        self.stage().agent_name()
    }

    /// Decide and act for one subject.
    fn execute<'a>(&'a self, subject_id: &'a str) -> BoxFuture<'a, Outcome>;
}

/// Collaborators shared by every agent.
#[derive(Clone)]
pub struct AgentDeps {
    pub predictor: Arc<dyn Predictor>,
    pub mutator: Arc<dyn StateMutator>,
    pub memory: AgentMemory,
    pub envelope: CallEnvelope,
}

impl AgentDeps {
    pub fn new(
        predictor: Arc<dyn Predictor>,
        mutator: Arc<dyn StateMutator>,
        memory: AgentMemory,
        envelope: CallEnvelope,
    ) -> Self {
        Self {
            predictor,
            mutator,
            memory,
            envelope,
        }
    }

    pub(crate) async fn predict(&self, subject_id: &str) -> Result<serde_json::Value> {
        self.envelope
            .call("predict", || self.predictor.predict(subject_id))
            .await
    }

    pub(crate) async fn apply(
        &self,
        kind: MutationKind,
        subject_id: &str,
        payload: &serde_json::Value,
    ) -> Result<()> {
        self.envelope
            .call(kind.as_str(), || self.mutator.apply(kind, subject_id, payload))
            .await
    }
}

/// Predict, apply the prediction verbatim, remember it.
///
/// Shared by the agents whose decision is the prediction itself.
pub(crate) async fn predict_apply_remember(
    deps: &AgentDeps,
    stage: Stage,
    kind: MutationKind,
    success: OutcomeStatus,
    subject_id: &str,
) -> Outcome {
    let agent = stage.agent_name();

    let decision = match deps.predict(subject_id).await {
        Ok(decision) => decision,
        Err(e) => return failed(agent, subject_id, "prediction", e),
    };

    if let Err(e) = deps.apply(kind, subject_id, &decision).await {
        return failed(agent, subject_id, "mutation", e);
    }

    deps.memory.store(agent, subject_id, &decision).await;
    info!(agent, subject_id, outcome = %success, "Agent decision applied");
    Outcome::new(success, subject_id, decision)
}

pub(crate) fn failed(
    agent: &str,
    subject_id: &str,
    step: &str,
    error: haulage_core::HaulageError,
) -> Outcome {
    warn!(agent, subject_id, step, error = %error, "Agent execution failed");
    Outcome::error(subject_id, error.to_string())
}
