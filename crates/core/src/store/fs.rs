use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::VersionStore;
use crate::error::StoreError;
use crate::hashing::{content_slot, fingerprint};
use crate::model::VersionRecord;
use crate::util::{now, write_atomic};

const INDEX_FILE: &str = "versions.json";

/// Durable store rooted at a directory: `versions.json` plus one blob per target.
pub struct FsVersionStore {
    root: PathBuf,
    records: BTreeMap<String, VersionRecord>,
}

impl FsVersionStore {
    /// Opens (creating if needed) the store at `root`. A missing or corrupt index starts empty.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        let records = Self::load_all(&root);
        debug!(root = %root.display(), records = records.len(), "version store opened");
        Ok(Self { root, records })
    }

    fn index_path(root: &Path) -> PathBuf {
        root.join(INDEX_FILE)
    }

    fn load_all(root: &Path) -> BTreeMap<String, VersionRecord> {
        let path = Self::index_path(root);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "version index unreadable; starting empty");
                return BTreeMap::new();
            }
        };
        match serde_json::from_slice::<Vec<VersionRecord>>(&bytes) {
            Ok(list) => list.into_iter().map(|r| (r.target_id.clone(), r)).collect(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "version index corrupt; starting empty");
                BTreeMap::new()
            }
        }
    }

    fn flush(&self) -> Result<(), StoreError> {
        let list: Vec<&VersionRecord> = self.records.values().collect();
        let bytes = serde_json::to_vec_pretty(&list)?;
        let path = Self::index_path(&self.root);
        write_atomic(&path, &bytes).map_err(|e| StoreError::io(&path, e))
    }
}

impl VersionStore for FsVersionStore {
    fn get(&self, target_id: &str) -> Option<VersionRecord> {
        self.records.get(target_id).cloned()
    }

    fn read_content(&self, record: &VersionRecord) -> Result<Option<String>, StoreError> {
        let path = self.root.join(&record.content_ref);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn put(&mut self, target_id: &str, source_url: &str, content: &str) -> Result<VersionRecord, StoreError> {
        let fp = fingerprint(content);
        let slot = content_slot(target_id);
        let blob = self.root.join(&slot);

        if let Some(existing) = self.records.get(target_id) {
            if existing.fingerprint == fp && blob.exists() {
                return Ok(existing.clone());
            }
        }

        write_atomic(&blob, content.as_bytes()).map_err(|e| StoreError::io(&blob, e))?;

        let ts = now();
        let record = match self.records.get(target_id) {
            Some(existing) => VersionRecord {
                fingerprint: fp,
                content_ref: slot,
                source_url: source_url.to_string(),
                updated: ts,
                ..existing.clone()
            },
            None => VersionRecord {
                target_id: target_id.to_string(),
                fingerprint: fp,
                content_ref: slot,
                source_url: source_url.to_string(),
                first_seen: ts,
                updated: ts,
            },
        };
        self.records.insert(target_id.to_string(), record.clone());
        self.flush()?;
        Ok(record)
    }

    fn records(&self) -> Vec<VersionRecord> {
        self.records.values().cloned().collect()
    }
}
