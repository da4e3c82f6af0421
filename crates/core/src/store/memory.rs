use std::collections::{BTreeMap, HashMap};

use super::VersionStore;
use crate::error::StoreError;
use crate::hashing::{content_slot, fingerprint};
use crate::model::VersionRecord;
use crate::util::now;

/// In-memory store for tests. Not durable.
#[derive(Default)]
pub struct MemoryVersionStore {
    records: BTreeMap<String, VersionRecord>,
    blobs: HashMap<String, String>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the stored content of `target_id` while keeping its record.
    pub fn forget_content(&mut self, target_id: &str) {
        self.blobs.remove(&content_slot(target_id));
    }
}

impl VersionStore for MemoryVersionStore {
    fn get(&self, target_id: &str) -> Option<VersionRecord> {
        self.records.get(target_id).cloned()
    }

    fn read_content(&self, record: &VersionRecord) -> Result<Option<String>, StoreError> {
        Ok(self.blobs.get(&record.content_ref).cloned())
    }

    fn put(&mut self, target_id: &str, source_url: &str, content: &str) -> Result<VersionRecord, StoreError> {
        let slot = content_slot(target_id);
        let ts = now();
        let first_seen = self.records.get(target_id).map(|r| r.first_seen).unwrap_or(ts);
        let record = VersionRecord {
            target_id: target_id.to_string(),
            fingerprint: fingerprint(content),
            content_ref: slot.clone(),
            source_url: source_url.to_string(),
            first_seen,
            updated: ts,
        };
        self.blobs.insert(slot, content.to_string());
        self.records.insert(target_id.to_string(), record.clone());
        Ok(record)
    }

    fn records(&self) -> Vec<VersionRecord> {
        self.records.values().cloned().collect()
    }
}
