//! Topology Module
//!
//! The mutable reachability graph as seen from one node, plus the transport used to talk
//! across it.
//!
//! ## Core Concepts
//! - **Registry**: `PeerRegistry` maps peer ids to addresses and a link state. Links are created
//!   and severed at runtime (`ConnectivityChange`) to simulate partitions.
//! - **Reachability**: only `Up` links are used for client routing and for the stabilization
//!   fan-out. A severed link is refused in both directions.
//! - **Transport**: `PeerClient` issues request/reply calls with a per-call timeout and reports
//!   "call failed" separately from "remote rejected".

pub mod handlers;
pub mod registry;
pub mod transport;
pub mod types;

pub const ENDPOINT_CONNECTIVITY: &str = "/connectivity";
