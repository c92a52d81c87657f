//! Cluster Coordinator Module
//!
//! The operator's side of a deployment. Talks to replica nodes over their HTTP surface only.
//!
//! ## Core Concepts
//! - **Rounds**: `init_stabilize` asks one replica to root a round; `stabilize_all` repeats this
//!   from uncovered replicas so every connected component is reconciled once.
//! - **Links**: `connect`/`disconnect` change both endpoints of a link so a partition is
//!   symmetric.

pub mod coordinator;
