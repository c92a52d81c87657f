//! Replica Store
//!
//! One replica's copy of the key-value table together with its causal clock.
//!
//! ## Responsibilities
//! - **Clock bookkeeping**: every Put/Get merges the caller's clock and ticks the replica slot.
//! - **Conflict resolution**: a Put is accepted only if its clock supersedes the stored one under
//!   the total order, so every replica picks the same winner without coordination.
//! - **Commit**: stabilization rounds install their winners through `apply_committed`, which also
//!   bumps the epoch that clients use to detect stale caches.

use super::record::{Record, Table};
use crate::clock::{ClockError, ProcessId, VectorClock};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Result of a Put. `conflict` carries the authoritative record when the write lost.
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub conflict: Option<Record>,
    pub clock: VectorClock,
}

/// Result of a Get. `record` is `None` for an absent key.
#[derive(Debug, Clone)]
pub struct GetOutcome {
    pub record: Option<Record>,
    pub clock: VectorClock,
}

pub struct ReplicaStore {
    id: ProcessId,
    clock: Mutex<VectorClock>,
    table: RwLock<Table>,
    epoch: AtomicU64,
}

impl ReplicaStore {
    pub fn new(id: ProcessId) -> Result<Self, ClockError> {
        Ok(Self {
            id,
            clock: Mutex::new(VectorClock::new(id)?),
            table: RwLock::new(Table::new()),
            epoch: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub async fn clock(&self) -> VectorClock {
        self.clock.lock().await.clone()
    }

    /// Merges the caller's clock and ticks our own slot. Returns the new local clock.
    async fn observe(&self, caller: &VectorClock) -> Result<VectorClock, ClockError> {
        caller.validate()?;
        let mut clock = self.clock.lock().await;
        clock.merge(caller);
        clock.increment(self.id)?;
        Ok(clock.clone())
    }

    pub async fn put(
        &self,
        key: String,
        value: String,
        caller: VectorClock,
    ) -> Result<PutOutcome, ClockError> {
        let clock = self.observe(&caller).await?;
        let candidate = Record::new(value, caller);

        let mut table = self.table.write().await;
        match table.get(&key) {
            Some(existing) if !candidate.supersedes(existing) => {
                tracing::debug!(
                    "Replica {} rejected put {} (stored {} vs candidate {})",
                    self.id,
                    key,
                    existing.timestamp(),
                    candidate.timestamp()
                );
                Ok(PutOutcome {
                    conflict: Some(existing.clone()),
                    clock,
                })
            }
            _ => {
                tracing::debug!(
                    "Replica {} stored {} = {} at {}",
                    self.id,
                    key,
                    candidate.value(),
                    candidate.timestamp()
                );
                table.insert(key, candidate);
                Ok(PutOutcome {
                    conflict: None,
                    clock,
                })
            }
        }
    }

    pub async fn get(&self, key: &str, caller: &VectorClock) -> Result<GetOutcome, ClockError> {
        let clock = self.observe(caller).await?;
        let record = self.table.read().await.get(key).cloned();
        Ok(GetOutcome { record, clock })
    }

    /// Lookup without clock bookkeeping, for inspection.
    pub async fn get_local(&self, key: &str) -> Option<Record> {
        self.table.read().await.get(key).cloned()
    }

    pub async fn snapshot(&self) -> Table {
        self.table.read().await.clone()
    }

    /// Installs the winners of a stabilization round and bumps the epoch.
    ///
    /// A key is overwritten unless the local record strictly wins, which only happens when a
    /// Put landed here after this node reported its table. Returns the number of keys written.
    pub async fn apply_committed(&self, winners: &Table) -> usize {
        let mut table = self.table.write().await;
        let mut written = 0;
        for (key, record) in winners {
            match table.get(key) {
                Some(local) if local.supersedes(record) => {
                    tracing::debug!(
                        "Replica {} keeps newer local {} over committed record",
                        self.id,
                        key
                    );
                }
                Some(local) if local == record => {}
                _ => {
                    table.insert(key.clone(), record.clone());
                    written += 1;
                }
            }
        }
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            "Replica {} committed {} key(s), epoch now {}",
            self.id,
            written,
            epoch
        );
        written
    }

    /// Key -> value view without timestamps.
    pub async fn dump(&self) -> BTreeMap<String, String> {
        self.table
            .read()
            .await
            .iter()
            .map(|(key, record)| (key.clone(), record.value().to_string()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }
}
