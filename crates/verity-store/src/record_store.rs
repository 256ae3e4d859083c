//! The record store contract.
//!
//! A record store persists JSON documents under unique string keys:
//! - `save(id, record)` replaces whatever was stored under `id`
//! - `load(id)` fails with `NotFound` or `Corrupt`
//! - `exists(id)` never fails for a well-formed ID
//!
//! There is no partial update and no concurrency control. Writers
//! read-modify-write the whole record; concurrent writers to the same ID race
//! and the last write wins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Keyed JSON record persistence.
pub trait RecordStore: Send + Sync {
    /// Persist `record` under `id`, overwriting any previous record.
    fn save(&self, id: &str, record: &Value) -> StoreResult<()>;

    /// Load the record stored under `id`.
    fn load(&self, id: &str) -> StoreResult<Value>;

    /// Check whether a record is stored under `id`.
    fn exists(&self, id: &str) -> StoreResult<bool>;
}

/// Serialize `record` and persist it under `id`.
pub fn save_record<T: Serialize>(
    store: &dyn RecordStore,
    id: &str,
    record: &T,
) -> StoreResult<()> {
    let value = serde_json::to_value(record)?;
    store.save(id, &value)
}

/// Load the record under `id` and decode it as `T`.
///
/// A record that parses as JSON but does not match `T` is reported as
/// `Corrupt`, the same as unparseable bytes.
pub fn load_record<T: DeserializeOwned>(store: &dyn RecordStore, id: &str) -> StoreResult<T> {
    let value = store.load(id)?;
    serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Reject IDs that cannot safely name a single record.
///
/// IDs become file names in [`crate::FsRecordStore`], so path separators,
/// parent references and leading dots are refused for every backend.
pub fn validate_record_id(id: &str) -> StoreResult<()> {
    let invalid = id.is_empty()
        || id.starts_with('.')
        || id.contains(&['/', '\\', '\0'][..])
        || id.contains("..");
    if invalid {
        return Err(StoreError::InvalidId { id: id.to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_generated_style_ids() {
        assert!(validate_record_id("sysA_20250426151852_1a2b3c4d").is_ok());
        assert!(validate_record_id("orch_sysA_20250426151852_1a2b3c4d").is_ok());
    }

    #[test]
    fn rejects_path_like_ids() {
        for id in ["", ".hidden", "../escape", "a/b", "a\\b", "nul\0byte"] {
            assert!(
                matches!(validate_record_id(id), Err(StoreError::InvalidId { .. })),
                "expected {id:?} to be rejected"
            );
        }
    }
}
