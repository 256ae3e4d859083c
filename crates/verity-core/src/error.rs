//! Domain-level error taxonomy for VerityAI.

use verity_store::StoreError;

/// Which kind of record a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Assessment,
    Orchestration,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Assessment => f.write_str("assessment"),
            RecordKind::Orchestration => f.write_str("orchestration"),
        }
    }
}

/// VerityAI domain errors.
#[derive(Debug, thiserror::Error)]
pub enum VerityError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    #[error("record {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("unsupported report format: {0}")]
    UnsupportedFormat(String),

    #[error("assessor unavailable: {0}")]
    AssessorUnavailable(String),

    #[error("score {score} for dimension {dimension} is outside 0.0..=5.0")]
    ScoreOutOfRange { dimension: String, score: f64 },

    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error("no agents registered")]
    NoAgentsRegistered,

    #[error("every agent failed to create an assessment for system {system_id}: {cause}")]
    FanOutFailed { system_id: String, cause: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VerityError {
    /// Convert a store error raised while resolving a record of `kind`.
    pub(crate) fn from_store(kind: RecordKind, err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => VerityError::NotFound { kind, id },
            StoreError::Corrupt { id, reason } => VerityError::Corrupt { id, reason },
            other => VerityError::Storage(other.to_string()),
        }
    }
}

impl From<StoreError> for VerityError {
    fn from(err: StoreError) -> Self {
        VerityError::from_store(RecordKind::Assessment, err)
    }
}

/// Result type for VerityAI domain operations.
pub type Result<T> = std::result::Result<T, VerityError>;
