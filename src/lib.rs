//! Causal Key-Value Store Library
//!
//! An eventually-consistent, partition-tolerant key-value store. Replicas accept writes
//! independently; vector clocks decide every conflict the same way everywhere, and a
//! stabilization round reconciles replicas once links come back.
//!
//! ## Architecture Modules
//! - **`clock`**: vector clocks, their causal comparison and the total order used to pick
//!   winners.
//! - **`storage`**: one replica's table of clock-tagged records and its Put/Get surface.
//! - **`topology`**: the per-node link graph (create/sever at runtime) and the peer transport.
//! - **`stabilize`**: the gather/scatter round run over whatever links are up.
//! - **`client`**: the client session with its epoch-tagged cache.
//! - **`cluster`**: the operator coordinator (rounds, link changes, store dumps).
//! - **`server`** / **`config`**: axum routers for replica and client nodes, and the command
//!   line surface of the binary.

pub mod client;
pub mod clock;
pub mod cluster;
pub mod config;
pub mod server;
pub mod stabilize;
pub mod storage;
pub mod topology;

#[cfg(test)]
pub(crate) mod testkit;
