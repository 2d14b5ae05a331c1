use thiserror::Error;

#[derive(Debug, Error)]
pub enum HaulageError {
    // External collaborator errors
    #[error("Predictor call failed: {model}: {message}")]
    Predictor { model: String, message: String },

    #[error("State mutation failed: {kind}: {message}")]
    Mutation { kind: String, message: String },

    #[error("External call timed out after {timeout_secs}s: {call}")]
    Timeout { call: String, timeout_secs: u64 },

    #[error("Notification failed: {0}")]
    Notification(String),

    // Storage errors
    #[error("Memory store error: {0}")]
    Memory(String),

    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("Database error: {0}")]
    Database(String),

    // Retrieval errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding request failed: {0}")]
    Embedding(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Recovery class of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A predictor, mutation or memory call failed. Recovered at the agent
    /// boundary as an `error` outcome.
    TransientExternal,
    /// One retrieval sub-index is unusable. Recovered by using the other.
    RetrievalDegradation,
    /// Backing stores or config unusable. Fatal.
    Configuration,
    /// Caller supplied bad input.
    InvalidInput,
}

impl HaulageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HaulageError::Predictor { .. }
            | HaulageError::Mutation { .. }
            | HaulageError::Timeout { .. }
            | HaulageError::Notification(_)
            | HaulageError::Memory(_) => ErrorKind::TransientExternal,
            HaulageError::Retrieval(_)
            | HaulageError::DimensionMismatch { .. }
            | HaulageError::Embedding(_) => ErrorKind::RetrievalDegradation,
            HaulageError::InvalidQuery(_) | HaulageError::Json(_) => ErrorKind::InvalidInput,
            HaulageError::Checkpoint(_)
            | HaulageError::Database(_)
            | HaulageError::Config(_)
            | HaulageError::ConfigNotFound(_)
            | HaulageError::Io(_) => ErrorKind::Configuration,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientExternal
    }
}

pub type Result<T> = std::result::Result<T, HaulageError>;
