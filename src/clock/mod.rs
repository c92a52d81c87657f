//! Causal Clock Module
//!
//! Vector clocks used to timestamp every write and every request in the cluster.
//!
//! ## Core Concepts
//! - **Slots**: One counter per process in a fixed id space (`0..CLOCK_WIDTH`). A process only
//!   ever increments its own slot.
//! - **Causality**: `compare` gives the component-wise partial order (Less/Greater/Concurrent/Equal).
//! - **Total Order**: `total_order` breaks concurrent ties by owner id, so every replica picks the
//!   same winner for the same pair of writes without talking to anyone.

pub mod vector;

pub use vector::{CLOCK_WIDTH, Causality, ClockError, ProcessId, VectorClock};

#[cfg(test)]
mod tests;
