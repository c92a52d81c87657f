use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Size of the process id space. Replicas and clients share it.
pub const CLOCK_WIDTH: usize = 10;

/// Identity of a replica or client process.
///
/// Ids are small integers so they can index a slot of a [`VectorClock`] directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// Returns the clock slot of this process, or `OutOfRange` if the id does not fit.
    pub fn slot(self) -> Result<usize, ClockError> {
        let slot = self.0 as usize;
        if slot < CLOCK_WIDTH {
            Ok(slot)
        } else {
            Err(ClockError::OutOfRange(self.0))
        }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProcessId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(ProcessId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    #[error("process id {0} is out of range (clock width is {CLOCK_WIDTH})")]
    OutOfRange(u32),
}

/// Result of the causal (partial order) comparison of two clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Causality {
    Less,
    Greater,
    Concurrent,
    Equal,
}

/// A vector clock stamped with the process that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorClock {
    owner: ProcessId,
    counters: [u64; CLOCK_WIDTH],
}

impl VectorClock {
    /// Creates a zeroed clock for `owner`.
    pub fn new(owner: ProcessId) -> Result<Self, ClockError> {
        owner.slot()?;
        Ok(Self {
            owner,
            counters: [0; CLOCK_WIDTH],
        })
    }

    pub fn owner(&self) -> ProcessId {
        self.owner
    }

    pub fn counters(&self) -> &[u64; CLOCK_WIDTH] {
        &self.counters
    }

    /// Checks that the owner id fits the id space. Clocks built locally always pass;
    /// clocks decoded from the wire may not.
    pub fn validate(&self) -> Result<(), ClockError> {
        self.owner.slot().map(|_| ())
    }

    /// Advances the slot of `id` by one.
    pub fn increment(&mut self, id: ProcessId) -> Result<(), ClockError> {
        let slot = id.slot()?;
        self.counters[slot] += 1;
        Ok(())
    }

    /// Pointwise maximum with `other`. The owner is left untouched.
    pub fn merge(&mut self, other: &VectorClock) {
        for (mine, theirs) in self.counters.iter_mut().zip(other.counters.iter()) {
            *mine = (*mine).max(*theirs);
        }
    }

    pub fn compare(&self, other: &VectorClock) -> Causality {
        let mut less = false;
        let mut greater = false;

        for (mine, theirs) in self.counters.iter().zip(other.counters.iter()) {
            match mine.cmp(theirs) {
                Ordering::Less => less = true,
                Ordering::Greater => greater = true,
                Ordering::Equal => {}
            }
            if less && greater {
                return Causality::Concurrent;
            }
        }

        match (less, greater) {
            (true, false) => Causality::Less,
            (false, true) => Causality::Greater,
            _ => Causality::Equal,
        }
    }

    /// Deterministic total order over clocks.
    ///
    /// Causally ordered clocks keep their order. Concurrent (or equal) clocks are ordered by
    /// owner id; if the owners match too, the counters are compared lexicographically.
    pub fn total_order(&self, other: &VectorClock) -> Ordering {
        match self.compare(other) {
            Causality::Less => Ordering::Less,
            Causality::Greater => Ordering::Greater,
            Causality::Concurrent | Causality::Equal => self
                .owner
                .cmp(&other.owner)
                .then_with(|| self.counters.cmp(&other.counters)),
        }
    }

    /// `true` if `self` strictly wins over `other` under [`VectorClock::total_order`].
    pub fn supersedes(&self, other: &VectorClock) -> bool {
        self.total_order(other) == Ordering::Greater
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<<")?;
        for (i, counter) in self.counters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", counter)?;
        }
        write!(f, ">, {}>", self.owner)
    }
}
