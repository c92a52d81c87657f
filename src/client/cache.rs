use crate::storage::record::Record;
use std::collections::HashMap;

/// Session cache keyed by the store epoch it was filled under.
///
/// `entries` is cleared whenever a replica reports a newer epoch. `high_water` keeps the
/// greatest record a replica confirmed per key and survives invalidation; reads never return
/// anything older. Unacknowledged writes only ever land in `entries`.
#[derive(Debug, Default)]
pub struct VersionedCache {
    entries: HashMap<String, Record>,
    high_water: HashMap<String, Record>,
    known_epoch: u64,
}

impl VersionedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_epoch(&self) -> u64 {
        self.known_epoch
    }

    /// Adopts `epoch` if it is newer than the known one, dropping every cached entry.
    /// Returns whether the cache was invalidated.
    pub fn observe_epoch(&mut self, epoch: u64) -> bool {
        if epoch <= self.known_epoch {
            return false;
        }
        self.known_epoch = epoch;
        self.entries.clear();
        true
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.entries.get(key)
    }

    /// Caches a write the replica has not acknowledged yet. It does not raise the floor.
    pub fn insert_pending(&mut self, key: &str, record: Record) {
        self.entries.insert(key.to_string(), record);
    }

    /// Caches `record`, which a replica stored or returned, as the current value of `key`.
    pub fn insert(&mut self, key: &str, record: Record) {
        match self.high_water.get(key) {
            Some(current) if !record.supersedes(current) => {}
            _ => {
                self.high_water.insert(key.to_string(), record.clone());
            }
        }
        self.entries.insert(key.to_string(), record);
    }

    /// Applies the monotonic-read floor to a replica answer.
    pub fn floor(&self, key: &str, answer: Option<Record>) -> Option<Record> {
        match (self.high_water.get(key), answer) {
            (Some(seen), Some(record)) if seen.supersedes(&record) => {
                tracing::debug!("Replica answer for '{}' is older than one already seen", key);
                Some(seen.clone())
            }
            (Some(seen), None) => Some(seen.clone()),
            (_, answer) => answer,
        }
    }

    /// Drops every cached entry, keeping the epoch and the high-water marks.
    pub fn clear(&mut self) -> usize {
        let cleared = self.entries.len();
        self.entries.clear();
        cleared
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
