//! Checkpointed workflow over the four decision stages.
//!
//! The DAG is fixed (see [`graph::EDGES`]). [`WorkflowOrchestrator`] walks it
//! in waves, persisting the [`RunState`](haulage_core::types::RunState) after
//! every stage transition so an interrupted or partially failed run can be
//! resumed by correlation id.

pub mod executor;
pub mod graph;

pub use executor::{WorkflowOrchestrator, WorkflowRequest, ORCHESTRATOR_AGENT};
pub use graph::{dependents, predecessors, EDGES};
