use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StoreError;
use crate::record_store::{validate_record_id, RecordStore, StoreResult};

/// Filesystem-backed record store.
///
/// Layout: `<root>/<id>.json`, pretty-printed. Writes go to a temp file in the
/// same directory and are renamed into place, so a reader never observes a
/// half-written record.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
}

impl FsRecordStore {
    /// Create a store rooted at `root`. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the record files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

impl RecordStore for FsRecordStore {
    fn save(&self, id: &str, record: &Value) -> StoreResult<()> {
        validate_record_id(id)?;
        let bytes = serde_json::to_vec_pretty(record)?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.persist(self.record_path(id)).map_err(|e| e.error)?;

        debug!(record_id = %id, bytes = bytes.len(), "record saved");
        Ok(())
    }

    fn load(&self, id: &str) -> StoreResult<Value> {
        validate_record_id(id)?;
        let bytes = fs::read(self.record_path(id)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound { id: id.to_string() }
            } else {
                StoreError::Io(e)
            }
        })?;

        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    fn exists(&self, id: &str) -> StoreResult<bool> {
        validate_record_id(id)?;
        Ok(self.record_path(id).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_store() -> (tempfile::TempDir, FsRecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsRecordStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn one_file_per_record() {
        let (dir, store) = make_store();
        store.save("sysA_1", &json!({"status": "initialized"})).unwrap();

        let path = dir.path().join("sysA_1.json");
        assert!(path.is_file());
        let on_disk: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(on_disk["status"], "initialized");
    }

    #[test]
    fn overwrite_leaves_no_temp_files() {
        let (dir, store) = make_store();
        store.save("rec", &json!({"v": 1})).unwrap();
        store.save("rec", &json!({"v": 2})).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.load("rec").unwrap()["v"], 2);
    }

    #[test]
    fn garbage_on_disk_is_corrupt() {
        let (dir, store) = make_store();
        std::fs::write(dir.path().join("broken.json"), b"{not json").unwrap();

        match store.load("broken") {
            Err(StoreError::Corrupt { id, .. }) => assert_eq!(id, "broken"),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FsRecordStore::new(&nested).unwrap();
        assert_eq!(store.root(), nested.as_path());
        assert!(nested.is_dir());
    }

    #[test]
    fn path_like_id_never_touches_disk() {
        let (_dir, store) = make_store();
        let err = store.save("../outside", &json!({})).unwrap_err();
        assert!(matches!(err, StoreError::InvalidId { .. }));
    }
}
