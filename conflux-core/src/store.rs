//! Abstract upsert-by-key adapter over the canonical collections.
//!
//! The persistence technology behind the canonical store is an external
//! collaborator; the engine only needs partial field patches keyed by
//! stable title identity. [`MemoryRecordStore`] is the in-process
//! reference implementation used by tests and small deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Mutex;
use tracing::debug;

use conflux_model::{
    CanonicalRecord, FieldPath, MediaKind, RecordPatch, SyncHistoryEntry,
    TitleKey,
};

use crate::error::{Result, SyncError};

/// Document-store port: find, partial-patch upsert, bulk placeholder
/// insert, plus the sync-history records the verifier consumes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_key(
        &self,
        key: &TitleKey,
    ) -> Result<Option<CanonicalRecord>>;

    /// Apply a partial update to the record at `key`. Absent patch
    /// slots leave stored fields untouched; discovery provenance is
    /// never written through this path.
    async fn upsert_patch(
        &self,
        key: &TitleKey,
        patch: RecordPatch,
    ) -> Result<()>;

    /// Best-effort bulk insert of minimal placeholders. Duplicate keys
    /// (e.g. raced by a concurrent run) are skipped, not errors; the
    /// returned count is how many records were actually inserted.
    async fn bulk_insert_placeholders(
        &self,
        records: Vec<CanonicalRecord>,
    ) -> Result<usize>;

    async fn all_records(
        &self,
        kind: MediaKind,
    ) -> Result<Vec<CanonicalRecord>>;

    async fn record_sync_history(
        &self,
        entry: SyncHistoryEntry,
    ) -> Result<()>;

    async fn sync_history(&self) -> Result<Vec<SyncHistoryEntry>>;
}

/// In-process canonical store keyed by title identity.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: DashMap<TitleKey, CanonicalRecord>,
    history: Mutex<Vec<SyncHistoryEntry>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operator path: freeze a field against automatic writes.
    pub fn lock_field(&self, key: &TitleKey, path: FieldPath) -> Result<()> {
        let mut record = self.records.get_mut(key).ok_or_else(|| {
            SyncError::Persistence(format!("no canonical record for {key}"))
        })?;
        record.locks.lock(path);
        Ok(())
    }

    /// Operator path: allow automatic writes again.
    pub fn unlock_field(
        &self,
        key: &TitleKey,
        path: FieldPath,
    ) -> Result<()> {
        let mut record = self.records.get_mut(key).ok_or_else(|| {
            SyncError::Persistence(format!("no canonical record for {key}"))
        })?;
        record.locks.unlock(path);
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_key(
        &self,
        key: &TitleKey,
    ) -> Result<Option<CanonicalRecord>> {
        Ok(self.records.get(key).map(|r| r.clone()))
    }

    async fn upsert_patch(
        &self,
        key: &TitleKey,
        patch: RecordPatch,
    ) -> Result<()> {
        let mut record = self.records.get_mut(key).ok_or_else(|| {
            SyncError::Persistence(format!(
                "patch targets unknown record {key}"
            ))
        })?;
        patch.apply_to(&mut record);
        debug!(key = %key, "applied field patch");
        Ok(())
    }

    async fn bulk_insert_placeholders(
        &self,
        records: Vec<CanonicalRecord>,
    ) -> Result<usize> {
        let mut inserted = 0usize;
        for record in records {
            match self.records.entry(record.key.clone()) {
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(record);
                    inserted += 1;
                }
            }
        }
        Ok(inserted)
    }

    async fn all_records(
        &self,
        kind: MediaKind,
    ) -> Result<Vec<CanonicalRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.clone())
            .collect())
    }

    async fn record_sync_history(
        &self,
        entry: SyncHistoryEntry,
    ) -> Result<()> {
        self.history
            .lock()
            .map_err(|_| {
                SyncError::Persistence("sync history lock poisoned".into())
            })?
            .push(entry);
        Ok(())
    }

    async fn sync_history(&self) -> Result<Vec<SyncHistoryEntry>> {
        Ok(self
            .history
            .lock()
            .map_err(|_| {
                SyncError::Persistence("sync history lock poisoned".into())
            })?
            .clone())
    }
}
