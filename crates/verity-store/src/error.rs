//! Error types for verity-store

use thiserror::Error;

/// Errors that can occur in the record persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record is stored under the requested ID
    #[error("record not found: {id}")]
    NotFound { id: String },

    /// Stored bytes exist but could not be parsed
    #[error("record {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    /// The ID cannot be used as a storage key
    #[error("invalid record id: {id:?}")]
    InvalidId { id: String },

    /// A record could not be serialized for writing
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
