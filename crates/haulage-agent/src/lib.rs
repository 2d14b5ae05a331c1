//! Decision agents, the call envelope around their external calls, the
//! workflow orchestrator and the application context that wires them up.

pub mod alert;
pub mod context;
pub mod decision;
pub mod envelope;
pub mod predictor;
pub mod workflow;

pub use alert::{AlertDispatcher, LogNotifier, WebhookNotifier};
pub use context::{assemble_orchestrator, AppContext, StagePredictors};
pub use decision::{
    AgentDeps, ComplianceAgent, DecisionAgent, MaintenanceAgent, ShipmentAgent, WarehouseAgent,
};
pub use envelope::CallEnvelope;
pub use predictor::{compliance_query, HttpPredictor, RetrievalPredictor};
pub use workflow::{WorkflowOrchestrator, WorkflowRequest, ORCHESTRATOR_AGENT};
