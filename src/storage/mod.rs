//! Replica Storage Module
//!
//! Implements one replica's in-memory key-value table.
//!
//! ## Core Concepts
//! - **Records**: every value carries the vector clock of the write that produced it.
//! - **Conditional writes**: a Put wins only if its clock supersedes the stored one under the
//!   clock total order; a losing Put gets the authoritative record back instead of an error.
//! - **Clocks**: the replica clock absorbs the caller's clock on every Put/Get.
//! - **Epoch**: a counter bumped by each committed stabilization round, read by clients to
//!   decide when their caches are stale.

pub mod handlers;
pub mod protocol;
pub mod record;
pub mod replica;
