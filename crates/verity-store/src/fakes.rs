//! In-memory fakes for the record store (testing only)
//!
//! `MemoryRecordStore` keeps serialized bytes rather than parsed values so
//! tests can plant unreadable records and exercise the `Corrupt` path.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::StoreError;
use crate::record_store::{validate_record_id, RecordStore, StoreResult};

/// In-memory record store backed by a `HashMap<id, bytes>`.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes under `id`, bypassing serialization.
    pub fn insert_raw(&self, id: &str, bytes: &[u8]) {
        let mut records = self.records.lock().unwrap();
        records.insert(id.to_string(), bytes.to_vec());
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored IDs, sorted.
    pub fn ids(&self) -> Vec<String> {
        let records = self.records.lock().unwrap();
        let mut ids: Vec<String> = records.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl RecordStore for MemoryRecordStore {
    fn save(&self, id: &str, record: &Value) -> StoreResult<()> {
        validate_record_id(id)?;
        let bytes = serde_json::to_vec(record)?;
        let mut records = self.records.lock().unwrap();
        records.insert(id.to_string(), bytes);
        Ok(())
    }

    fn load(&self, id: &str) -> StoreResult<Value> {
        validate_record_id(id)?;
        let records = self.records.lock().unwrap();
        let bytes = records
            .get(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    fn exists(&self, id: &str) -> StoreResult<bool> {
        validate_record_id(id)?;
        let records = self.records.lock().unwrap();
        Ok(records.contains_key(id))
    }
}
