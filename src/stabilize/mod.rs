//! Stabilization Module
//!
//! Anti-entropy for replicas that diverged while partitioned. One round reconciles every
//! replica reachable from its root.
//!
//! ## Core Concepts
//! - **Spanning tree**: built on the fly by claims over the current link graph. The first claim
//!   to reach a node makes the caller its parent; later claims of the same round are answered
//!   with `NotChild`, which cuts cycles.
//! - **Converge-cast**: each subtree reports the merge of its tables; the root ends up with the
//!   per-key winners of the whole component, picked with the same rule as a Put.
//! - **Broadcast commit**: the winners travel down the same tree and every member commits them
//!   and bumps its epoch.
//! - **Competing roots**: a round that runs into another live round is released and retried.

pub mod coordinator;
pub mod handlers;
pub mod protocol;
pub mod round;
