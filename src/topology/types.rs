use crate::clock::ProcessId;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Up,
    Down,
}

/// A replica this node knows about.
///
/// The `link` field is the local end of the (possibly severed) connection. Only peers with
/// an `Up` link take part in routing and in the stabilization fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub id: ProcessId,
    pub http_addr: SocketAddr,
    pub link: LinkState,
}

impl Peer {
    pub fn is_up(&self) -> bool {
        self.link == LinkState::Up
    }
}

/// Request to create or sever the link to `peer`.
///
/// `addr` is required the first time a link to an unknown peer is brought up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityChange {
    pub peer: ProcessId,
    pub addr: Option<SocketAddr>,
    pub state: LinkState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectivityResponse {
    /// `false` if the link was already in the requested state.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("peer {0} is unknown and no address was given")]
    UnknownPeer(ProcessId),
    #[error("a node cannot link to itself ({0})")]
    SelfLink(ProcessId),
}
