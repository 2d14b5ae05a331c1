use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use haulage_core::error::{HaulageError, Result};
use haulage_core::traits::CheckpointStore;
use haulage_core::types::{Outcome, RunState, Stage, StageStatus, Subjects};
use haulage_memory::AgentMemory;

use super::graph::{dependents, predecessors};
use crate::decision::DecisionAgent;

/// Memory namespace for run summaries.
pub const ORCHESTRATOR_AGENT: &str = "orchestrator";

/// A request to run (or resume) the workflow for one correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub correlation_id: String,
    pub subjects: Subjects,
}

impl WorkflowRequest {
    pub fn new(correlation_id: impl Into<String>, subjects: Subjects) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            subjects,
        }
    }

    /// Every stage acts on the correlation id itself.
    pub fn uniform(correlation_id: impl Into<String>) -> Self {
        let correlation_id = correlation_id.into();
        Self {
            subjects: Subjects::uniform(correlation_id.clone()),
            correlation_id,
        }
    }
}

/// Runs the four decision agents over the static stage DAG.
///
/// Run state is loaded from (or created in) the checkpoint store, every
/// eligible stage of a wave runs concurrently, and the state is saved after
/// each transition. Completed stages are never invoked again for the same
/// correlation id; failed and interrupted stages are retried on the next
/// invocation. Checkpoint errors abort the invocation.
pub struct WorkflowOrchestrator {
    agents: HashMap<Stage, Arc<dyn DecisionAgent>>,
    checkpoints: Arc<dyn CheckpointStore>,
    memory: AgentMemory,
}

impl WorkflowOrchestrator {
    /// Requires exactly one agent per stage.
    pub fn new(
        agents: Vec<Arc<dyn DecisionAgent>>,
        checkpoints: Arc<dyn CheckpointStore>,
        memory: AgentMemory,
    ) -> Result<Self> {
        let mut by_stage: HashMap<Stage, Arc<dyn DecisionAgent>> = HashMap::new();
        for agent in agents {
            let stage = agent.stage();
            if by_stage.insert(stage, agent).is_some() {
                return Err(HaulageError::Config(format!(
                    "More than one agent registered for stage '{}'",
                    stage
                )));
            }
        }
        for stage in Stage::ALL {
            if !by_stage.contains_key(&stage) {
                return Err(HaulageError::Config(format!(
                    "No agent registered for stage '{}'",
                    stage
                )));
            }
        }

        Ok(Self {
            agents: by_stage,
            checkpoints,
            memory,
        })
    }

    /// Run the workflow using `correlation_id` as every stage's subject.
    pub async fn execute_workflow(&self, correlation_id: &str) -> Result<RunState> {
        self.execute_request(WorkflowRequest::uniform(correlation_id))
            .await
    }

    /// Run or resume the workflow. A resumed run keeps the subjects stored
    /// in its checkpoint.
    pub async fn execute_request(&self, request: WorkflowRequest) -> Result<RunState> {
        let start = Instant::now();
        let mut state = match self.checkpoints.load(&request.correlation_id).await? {
            Some(existing) if existing.is_completed() => {
                info!(
                    correlation_id = %request.correlation_id,
                    attempt = existing.attempt,
                    "Workflow run already completed"
                );
                return Ok(existing);
            }
            Some(existing) => {
                info!(
                    correlation_id = %request.correlation_id,
                    attempt = existing.attempt + 1,
                    "Resuming workflow run"
                );
                existing
            }
            None => {
                info!(correlation_id = %request.correlation_id, "Starting workflow run");
                RunState::new(request.correlation_id.clone(), request.subjects)
            }
        };

        state.attempt += 1;
        for stage in Stage::ALL {
            if state.status(stage) != StageStatus::Completed {
                state.set_status(stage, StageStatus::Pending);
            }
        }
        self.checkpoints.save(&state).await?;

        loop {
            self.propagate_failures(&mut state).await?;

            let ready: Vec<Stage> = Stage::ALL
                .into_iter()
                .filter(|s| state.status(*s) == StageStatus::Pending)
                .filter(|s| {
                    predecessors(*s)
                        .iter()
                        .all(|p| state.status(*p) == StageStatus::Completed)
                })
                .collect();
            if ready.is_empty() {
                break;
            }

            for stage in &ready {
                state.set_status(*stage, StageStatus::InProgress);
            }
            self.checkpoints.save(&state).await?;

            let mut running: FuturesUnordered<_> = ready
                .iter()
                .map(|stage| {
                    let stage = *stage;
                    let agent = self.agents[&stage].clone();
                    let subject_id = state.subjects.subject_for(stage).to_string();
                    async move {
                        debug!(stage = %stage, subject_id = %subject_id, "Invoking agent");
                        let outcome = agent.execute(&subject_id).await;
                        (stage, outcome)
                    }
                })
                .collect();

            while let Some((stage, outcome)) = running.next().await {
                record_outcome(&mut state, stage, outcome);
                self.checkpoints.save(&state).await?;
            }
        }

        self.memory
            .store(
                ORCHESTRATOR_AGENT,
                &state.correlation_id,
                &state.status_summary(),
            )
            .await;

        info!(
            correlation_id = %state.correlation_id,
            attempt = state.attempt,
            completed = state.is_completed(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Workflow run finished"
        );
        Ok(state)
    }

    /// Latest stored state for a run, if any.
    pub async fn status(&self, correlation_id: &str) -> Result<Option<RunState>> {
        self.checkpoints.load(correlation_id).await
    }

    /// Fail every pending stage downstream of a failed one, without invoking
    /// it. Stages are visited in topological order, so a stage failed here
    /// passes the failure on to its own dependents in the same pass.
    async fn propagate_failures(&self, state: &mut RunState) -> Result<()> {
        let mut changed = false;
        for upstream in Stage::ALL {
            if state.status(upstream) != StageStatus::Failed {
                continue;
            }
            for stage in dependents(upstream) {
                if state.status(stage) != StageStatus::Pending {
                    continue;
                }
                warn!(
                    correlation_id = %state.correlation_id,
                    stage = %stage,
                    upstream = %upstream,
                    "Skipping stage, upstream failed"
                );
                state.finish(
                    stage,
                    StageStatus::Failed,
                    None,
                    Some(format!("upstream stage '{}' failed", upstream)),
                );
                changed = true;
            }
        }
        if changed {
            self.checkpoints.save(state).await?;
        }
        Ok(())
    }
}

fn record_outcome(state: &mut RunState, stage: Stage, outcome: Outcome) {
    if outcome.status.is_error() {
        let error = outcome
            .payload
            .as_str()
            .map(String::from)
            .unwrap_or_else(|| outcome.payload.to_string());
        warn!(
            correlation_id = %state.correlation_id,
            stage = %stage,
            error = %error,
            "Stage failed"
        );
        state.finish(stage, StageStatus::Failed, Some(outcome), Some(error));
    } else {
        info!(
            correlation_id = %state.correlation_id,
            stage = %stage,
            outcome = %outcome.status,
            "Stage completed"
        );
        state.finish(stage, StageStatus::Completed, Some(outcome), None);
    }
}
