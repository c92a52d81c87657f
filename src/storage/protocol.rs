//! Storage Network Protocol
//!
//! API endpoints and DTOs for the client-facing replica calls (Put, Get, epoch query) and the
//! inspection endpoints. Bodies are JSON.

use super::record::Record;
use crate::clock::{ProcessId, VectorClock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- API Endpoints ---

/// Conditional write of a key.
pub const ENDPOINT_PUT: &str = "/put";
/// Read of a key. POST because the caller's clock travels with it.
pub const ENDPOINT_GET: &str = "/get";
/// Current store epoch, bumped by every committed stabilization round.
pub const ENDPOINT_EPOCH: &str = "/epoch";
/// Key -> value view of the whole table, without timestamps.
pub const ENDPOINT_STORE: &str = "/store";
/// Node summary.
pub const ENDPOINT_STATUS: &str = "/status";

// --- Data Transfer Objects ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
    /// The writer's clock; it becomes the record timestamp if the write wins.
    pub clock: VectorClock,
}

/// Reply to a Put.
///
/// `conflict` is set when the write lost against the stored record, and then carries that
/// record. `clock` is the replica clock after the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutResponse {
    pub conflict: Option<Record>,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRequest {
    pub key: String,
    pub clock: VectorClock,
}

/// Reply to a Get. `record: None` is the NOT_FOUND result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    pub record: Option<Record>,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochResponse {
    pub epoch: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDumpResponse {
    pub id: ProcessId,
    pub entries: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub id: ProcessId,
    pub epoch: u64,
    pub keys: usize,
    pub clock: VectorClock,
    /// Ids of peers with an `Up` link.
    pub reachable: Vec<ProcessId>,
    /// Whether the node is currently part of a stabilization round.
    pub in_round: bool,
}
