//! Client Node Protocol
//!
//! HTTP surface of a client session process. Bodies are JSON.

use crate::clock::{ProcessId, VectorClock};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub const ENDPOINT_CLIENT_PUT: &str = "/put";
pub const ENDPOINT_CLIENT_GET: &str = "/get/:key";
pub const ENDPOINT_LINK: &str = "/link";
pub const ENDPOINT_UNLINK: &str = "/unlink";
pub const ENDPOINT_INVALIDATE: &str = "/invalidate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPutRequest {
    pub key: String,
    pub value: String,
}

/// `value` is what the session now holds for the key: the written value, or the stored one
/// when the write lost (`conflict`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPutResponse {
    pub key: String,
    pub value: String,
    pub conflict: bool,
    pub replica: ProcessId,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientGetResponse {
    pub key: String,
    pub value: Option<String>,
    /// `None` when answered from the cache.
    pub replica: Option<ProcessId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRequest {
    pub replica: ProcessId,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlinkRequest {
    pub replica: ProcessId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResponse {
    pub changed: bool,
    pub replicas: Vec<ProcessId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub cleared: usize,
}
