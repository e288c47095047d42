use crate::domain::MessageRecord;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::path::Path;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Message id -> retained record.
///
/// Every operation is independently atomic. Callers must not hold a record
/// reference across I/O; the getters return owned clones for that reason.
#[derive(Debug, Clone, Default)]
pub struct ShadowStore {
    records: Arc<DashMap<String, MessageRecord>>,
}

impl ShadowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional upsert. Returns the record it replaced, if any.
    pub fn put(&self, record: MessageRecord) -> Option<MessageRecord> {
        self.records.insert(record.id.clone(), record)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<MessageRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Removing an absent id is a no-op.
    pub fn remove(&self, id: &str) -> Option<MessageRecord> {
        self.records.remove(id).map(|(_, record)| record)
    }

    /// Removes `id` only if it is still expired at `now`, so a record that was
    /// replaced between snapshot and eviction survives.
    pub fn remove_if_expired(&self, id: &str, now: OffsetDateTime, ttl: Duration) -> Option<MessageRecord> {
        self.records.remove_if(id, |_, record| record.is_expired_at(now, ttl)).map(|(_, record)| record)
    }

    /// Ids present at the time of the call. Holds no lock once it returns.
    #[must_use]
    pub fn snapshot_ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }

    /// Flags the record's media as written, provided it still points at `path`.
    pub fn mark_materialized(&self, id: &str, path: &Path) -> bool {
        match self.records.get_mut(id) {
            Some(mut record) if record.media_path() == Some(path) => {
                record.materialized = true;
                true
            }
            _ => false,
        }
    }

    /// Whether any record still points at `path`.
    #[must_use]
    pub fn references_path(&self, path: &Path) -> bool {
        self.records.iter().any(|r| r.media_path() == Some(path))
    }

    /// Removes `id` if its media at `path` never landed.
    pub fn remove_unmaterialized(&self, id: &str, path: &Path) -> Option<MessageRecord> {
        self.records
            .remove_if(id, |_, record| !record.materialized && record.media_path() == Some(path))
            .map(|(_, record)| record)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn reset(&self) {
        self.records.clear();
    }
}

/// Ids already ingested, kept apart from the store so an evicted id is still
/// recognised. Each id remembers its message's creation time for pruning.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    ids: Arc<DashMap<String, OffsetDateTime>>,
}

impl SeenSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `id` was not seen before.
    pub fn mark(&self, id: &str, created_at: OffsetDateTime) -> bool {
        match self.ids.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(created_at);
                true
            }
        }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Forgets ids whose messages are older than `window` at `now`.
    pub fn prune_older_than(&self, now: OffsetDateTime, window: Duration) -> usize {
        let before = self.ids.len();
        self.ids.retain(|_, created_at| now - *created_at <= window);
        before.saturating_sub(self.ids.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn reset(&self) {
        self.ids.clear();
    }
}
