use futures::future::BoxFuture;
use serde_json::json;
use tracing::info;

use haulage_core::config::DEFAULT_RISK_THRESHOLD;
use haulage_core::error::{HaulageError, Result};
use haulage_core::types::{MutationKind, Outcome, OutcomeStatus, Stage};

use super::{failed, AgentDeps, DecisionAgent};

pub const MAINTENANCE_SCHEDULED: &str = "Maintenance Scheduled";
pub const NO_ACTION_REQUIRED: &str = "No Action Required";

/// Schedules maintenance when predicted failure risk exceeds a threshold.
///
/// Risk at or below the threshold records "no action" in memory and leaves
/// the operational store untouched.
pub struct MaintenanceAgent {
    deps: AgentDeps,
    risk_threshold: f64,
}

impl MaintenanceAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self {
            deps,
            risk_threshold: DEFAULT_RISK_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, risk_threshold: f64) -> Self {
        self.risk_threshold = risk_threshold;
        self
    }

    async fn run(&self, subject_id: &str) -> Outcome {
        let agent = self.name();

        let prediction = match self.deps.predict(subject_id).await {
            Ok(p) => p,
            Err(e) => return failed(agent, subject_id, "prediction", e),
        };
        let risk = match parse_risk(&prediction, self.deps.predictor.name()) {
            Ok(risk) => risk,
            Err(e) => return failed(agent, subject_id, "prediction", e),
        };

        if risk > self.risk_threshold {
            let payload = json!(risk);
            if let Err(e) = self
                .deps
                .apply(MutationKind::ScheduleMaintenance, subject_id, &payload)
                .await
            {
                return failed(agent, subject_id, "mutation", e);
            }
            self.deps
                .memory
                .store(agent, subject_id, &json!(MAINTENANCE_SCHEDULED))
                .await;
            info!(subject_id, risk, "Maintenance scheduled");
            Outcome::new(OutcomeStatus::Scheduled, subject_id, payload)
        } else {
            self.deps
                .memory
                .store(agent, subject_id, &json!(NO_ACTION_REQUIRED))
                .await;
            info!(subject_id, risk, "Risk within threshold, no maintenance");
            Outcome::new(OutcomeStatus::NoAction, subject_id, json!(risk))
        }
    }
}

impl DecisionAgent for MaintenanceAgent {
    fn stage(&self) -> Stage {
        Stage::Maintenance
    }

    fn execute<'a>(&'a self, subject_id: &'a str) -> BoxFuture<'a, Outcome> {
        Box::pin(self.run(subject_id))
    }
}

/// Accepts a bare number or an object with a numeric `risk` field.
fn parse_risk(prediction: &serde_json::Value, model: &str) -> Result<f64> {
    prediction
        .as_f64()
        .or_else(|| prediction.get("risk").and_then(|r| r.as_f64()))
        .ok_or_else(|| HaulageError::Predictor {
            model: model.to_string(),
            message: format!("expected a numeric risk, got {}", prediction),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::CallEnvelope;
    use haulage_memory::AgentMemory;
    use haulage_test_utils::{InMemoryMemoryStore, MockMutator, MockPredictor};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        agent: MaintenanceAgent,
        mutator: Arc<MockMutator>,
        store: Arc<InMemoryMemoryStore>,
    }

    fn fixture(prediction: serde_json::Value) -> Fixture {
        let mutator = Arc::new(MockMutator::new());
        let store = Arc::new(InMemoryMemoryStore::new());
        let agent = MaintenanceAgent::new(AgentDeps::new(
            Arc::new(MockPredictor::returning("detect_failures", prediction)),
            mutator.clone(),
            AgentMemory::new(store.clone()),
            CallEnvelope::no_retry(Duration::from_secs(1)),
        ));
        Fixture {
            agent,
            mutator,
            store,
        }
    }

    #[tokio::test]
    async fn test_high_risk_schedules() {
        let f = fixture(json!(85));
        let outcome = f.agent.execute("EQ-7").await;

        assert_eq!(outcome.status, OutcomeStatus::Scheduled);
        let scheduled = f.mutator.applied_kind(MutationKind::ScheduleMaintenance);
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].subject_id, "EQ-7");
        assert_eq!(
            f.store.value("Maintenance AI:EQ-7"),
            Some(json!("Maintenance Scheduled"))
        );
    }

    #[tokio::test]
    async fn test_low_risk_no_action_without_mutation() {
        let f = fixture(json!({"risk": 40}));
        let outcome = f.agent.execute("EQ-7").await;

        assert_eq!(outcome.status, OutcomeStatus::NoAction);
        assert!(f.mutator.applied().is_empty());
        assert_eq!(
            f.store.value("Maintenance AI:EQ-7"),
            Some(json!("No Action Required"))
        );
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let f = fixture(json!(80));
        assert_eq!(f.agent.execute("EQ-1").await.status, OutcomeStatus::NoAction);
        assert!(f.mutator.applied().is_empty());
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let mut f = fixture(json!(60));
        f.agent = f.agent.with_threshold(50.0);
        assert_eq!(f.agent.execute("EQ-1").await.status, OutcomeStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_unreadable_risk_is_error() {
        let f = fixture(json!({"level": "high"}));
        let outcome = f.agent.execute("EQ-7").await;
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(f.store.is_empty());
    }
}
