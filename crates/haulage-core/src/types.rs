use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A position in the workflow DAG. Each stage is served by one decision agent.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compliance,
    Shipment,
    Warehouse,
    Maintenance,
}

impl Stage {
    /// All stages in topological order.
    pub const ALL: [Stage; 4] = [
        Stage::Compliance,
        Stage::Shipment,
        Stage::Warehouse,
        Stage::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Compliance => "compliance",
            Stage::Shipment => "shipment",
            Stage::Warehouse => "warehouse",
            Stage::Maintenance => "maintenance",
        }
    }

    /// Name the stage's agent writes memory under.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Stage::Compliance => "Compliance AI",
            Stage::Shipment => "Shipment AI",
            Stage::Warehouse => "Warehouse AI",
            Stage::Maintenance => "Maintenance AI",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single stage within a run.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Status and output of one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: StageStatus,
    /// Outcome of the last agent invocation, if any.
    #[serde(default)]
    pub outcome: Option<Outcome>,
    /// Why the stage failed.
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The entity ids each stage acts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subjects {
    pub shipment_id: String,
    pub product_id: String,
    pub equipment_id: String,
}

impl Subjects {
    /// Use one id for every stage.
    pub fn uniform(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            shipment_id: id.clone(),
            product_id: id.clone(),
            equipment_id: id,
        }
    }

    pub fn subject_for(&self, stage: Stage) -> &str {
        match stage {
            Stage::Compliance | Stage::Shipment => &self.shipment_id,
            Stage::Warehouse => &self.product_id,
            Stage::Maintenance => &self.equipment_id,
        }
    }
}

/// Persisted state of one workflow run.
///
/// Fixed shape: one record per stage. Created with every stage `Pending`,
/// mutated in place and checkpointed after every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub correlation_id: String,
    pub subjects: Subjects,
    pub compliance: StageRecord,
    pub shipment: StageRecord,
    pub warehouse: StageRecord,
    pub maintenance: StageRecord,
    /// Number of invocations that have touched this run.
    #[serde(default)]
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(correlation_id: impl Into<String>, subjects: Subjects) -> Self {
        let now = Utc::now();
        Self {
            correlation_id: correlation_id.into(),
            subjects,
            compliance: StageRecord::default(),
            shipment: StageRecord::default(),
            warehouse: StageRecord::default(),
            maintenance: StageRecord::default(),
            attempt: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self, stage: Stage) -> &StageRecord {
        match stage {
            Stage::Compliance => &self.compliance,
            Stage::Shipment => &self.shipment,
            Stage::Warehouse => &self.warehouse,
            Stage::Maintenance => &self.maintenance,
        }
    }

    pub fn stage_mut(&mut self, stage: Stage) -> &mut StageRecord {
        match stage {
            Stage::Compliance => &mut self.compliance,
            Stage::Shipment => &mut self.shipment,
            Stage::Warehouse => &mut self.warehouse,
            Stage::Maintenance => &mut self.maintenance,
        }
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        self.stage(stage).status
    }

    /// Transition a stage and stamp the change.
    pub fn set_status(&mut self, stage: Stage, status: StageStatus) {
        let now = Utc::now();
        let record = self.stage_mut(stage);
        record.status = status;
        record.updated_at = Some(now);
        self.updated_at = now;
    }

    /// Record the terminal result of a stage.
    pub fn finish(
        &mut self,
        stage: Stage,
        status: StageStatus,
        outcome: Option<Outcome>,
        error: Option<String>,
    ) {
        self.set_status(stage, status);
        let record = self.stage_mut(stage);
        record.outcome = outcome;
        record.error = error;
    }

    /// True once every stage is `Completed`.
    pub fn is_completed(&self) -> bool {
        Stage::ALL
            .iter()
            .all(|s| self.status(*s) == StageStatus::Completed)
    }

    pub fn has_failures(&self) -> bool {
        Stage::ALL
            .iter()
            .any(|s| self.status(*s) == StageStatus::Failed)
    }

    /// Stage name → status, as JSON.
    pub fn status_summary(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for stage in Stage::ALL {
            map.insert(
                stage.as_str().to_string(),
                serde_json::Value::String(self.status(stage).to_string()),
            );
        }
        serde_json::Value::Object(map)
    }
}

/// Decision reported by an agent.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Fixed,
    Rerouted,
    Optimized,
    Scheduled,
    NoAction,
    Error,
}

impl OutcomeStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, OutcomeStatus::Error)
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutcomeStatus::Fixed => "fixed",
            OutcomeStatus::Rerouted => "rerouted",
            OutcomeStatus::Optimized => "optimized",
            OutcomeStatus::Scheduled => "scheduled",
            OutcomeStatus::NoAction => "no_action",
            OutcomeStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Result of one agent execution. Never an unhandled error: failures are
/// folded into `status = Error` with the message as payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub subject_id: String,
    pub payload: serde_json::Value,
}

impl Outcome {
    pub fn new(
        status: OutcomeStatus,
        subject_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            status,
            subject_id: subject_id.into(),
            payload,
        }
    }

    pub fn error(subject_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            subject_id: subject_id.into(),
            payload: serde_json::Value::String(message.into()),
        }
    }
}

/// Write applied to the operational store by an agent.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    UpdateShipmentCompliance,
    UpdateShipmentRoute,
    UpdateInventory,
    ScheduleMaintenance,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::UpdateShipmentCompliance => "update_shipment_compliance",
            MutationKind::UpdateShipmentRoute => "update_shipment_route",
            MutationKind::UpdateInventory => "update_inventory",
            MutationKind::ScheduleMaintenance => "schedule_maintenance",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remembered agent decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// An alert raised by the surrounding service layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: String,
    pub alert_data: serde_json::Value,
    pub message: String,
}

impl Alert {
    pub fn new(alert_type: impl Into<String>, alert_data: serde_json::Value) -> Self {
        let alert_type = alert_type.into();
        let message = format!("Alert: {} - Details: {}", alert_type, alert_data);
        Self {
            alert_type,
            alert_data,
            message,
        }
    }
}

/// Memory namespace key: `agent:key`.
pub fn memory_key(agent: &str, key: &str) -> String {
    format!("{}:{}", agent, key)
}
