//! Stabilization Protocol
//!
//! Endpoints and messages of the gather/scatter round. Claims and scatters carry whole tables
//! and are encoded with bincode; release and the coordinator call are JSON.

use crate::clock::ProcessId;
use crate::storage::record::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Peer call: claim the receiver as a child of the caller (bincode).
pub const ENDPOINT_CLAIM: &str = "/internal/claim";
/// Peer call: commit the round winners down the tree (bincode).
pub const ENDPOINT_SCATTER: &str = "/internal/scatter";
/// Peer call: abandon a round without committing (JSON).
pub const ENDPOINT_RELEASE: &str = "/internal/release";
/// Coordinator call: run a round rooted at the receiver (JSON).
pub const ENDPOINT_STABILIZE: &str = "/stabilize";

/// Identity of one stabilization round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoundId(pub uuid::Uuid);

impl RoundId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RoundId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub round: RoundId,
    pub caller: ProcessId,
    /// Time the receiver may spend on its own fan-out, in milliseconds.
    pub budget_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClaimReply {
    /// The receiver joined the caller's tree; `table` is the merge of its whole subtree.
    Child {
        table: Table,
        members: BTreeSet<ProcessId>,
        contended: bool,
    },
    /// Already part of this round through another parent.
    NotChild,
    /// Held by a different, still live round.
    Contended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterRequest {
    pub round: RoundId,
    pub sender: ProcessId,
    pub table: Table,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterResponse {
    /// Keys written on the receiver itself.
    pub applied: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub round: RoundId,
    pub sender: ProcessId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

/// Reply to `/stabilize`: the replicas covered by the round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilizeResponse {
    pub covered: BTreeSet<ProcessId>,
}
