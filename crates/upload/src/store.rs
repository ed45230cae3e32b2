//! Authoritative record store.
//!
//! Maps each [`FileKey`] to its [`FileRecord`] and keeps insertion order for
//! rendering. Records are never removed, so the table shows the full session
//! history including failures.

use std::collections::HashMap;

use crate::types::{FileKey, FileRecord, FileStatus, RecordPatch};

/// Insertion-ordered map of file records.
#[derive(Debug, Clone, Default)]
pub struct FileRecordStore {
    records: Vec<FileRecord>,
    index: HashMap<FileKey, usize>,
}

impl FileRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `patch` into the record for `key`, creating it if absent.
    pub fn upsert(&mut self, key: &FileKey, patch: RecordPatch) -> &FileRecord {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.records.push(FileRecord::new(key.clone()));
                let idx = self.records.len() - 1;
                self.index.insert(key.clone(), idx);
                idx
            }
        };
        let record = &mut self.records[idx];
        record.apply(patch);
        record
    }

    pub fn get(&self, key: &FileKey) -> Option<&FileRecord> {
        self.index.get(key).map(|&idx| &self.records[idx])
    }

    pub fn contains(&self, key: &FileKey) -> bool {
        self.index.contains_key(key)
    }

    /// All records in insertion order.
    pub fn all(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records currently in `status`.
    pub fn count(&self, status: FileStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}
