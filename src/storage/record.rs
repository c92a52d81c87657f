use crate::clock::VectorClock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value paired with the clock of the write that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    value: String,
    timestamp: VectorClock,
}

impl Record {
    pub fn new(value: impl Into<String>, timestamp: VectorClock) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn timestamp(&self) -> &VectorClock {
        &self.timestamp
    }

    /// `true` if this record wins over `other` under the clock total order.
    pub fn supersedes(&self, other: &Record) -> bool {
        self.timestamp.supersedes(&other.timestamp)
    }
}

/// A key -> record table, as held by a replica and as shipped during stabilization.
pub type Table = BTreeMap<String, Record>;

/// Offers `incoming` for `key`; it is kept only if the key is absent or it supersedes the
/// current record. Returns whether the table changed.
pub fn offer(table: &mut Table, key: &str, incoming: &Record) -> bool {
    match table.get(key) {
        Some(current) if !incoming.supersedes(current) => false,
        _ => {
            table.insert(key.to_string(), incoming.clone());
            true
        }
    }
}

/// Folds every record of `other` into `into` with [`offer`]. Returns the number of keys that
/// changed.
pub fn merge_tables(into: &mut Table, other: &Table) -> usize {
    other
        .iter()
        .filter(|(key, record)| offer(into, key, record))
        .count()
}
