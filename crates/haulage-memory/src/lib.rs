pub mod agent_memory;
pub mod checkpoint;
pub mod store;

pub use agent_memory::AgentMemory;
pub use checkpoint::SqliteCheckpointStore;
pub use store::{AppliedDecision, SqliteStore};
