//! Client Module
//!
//! Session-side half of the store: a local clock, a versioned cache and the set of replicas
//! the session is linked to.
//!
//! ## Core Concepts
//! - **Session**: `ClientSession` issues Put/Get against one randomly chosen linked replica and
//!   falls through to the next one when a replica does not answer.
//! - **Cache**: `VersionedCache` is tagged with the last store epoch seen and is dropped when a
//!   replica reports a newer one. Absent keys are never cached.
//! - **Client node**: `handlers` expose a session over HTTP for the `client` subcommand.

pub mod cache;
pub mod handlers;
pub mod protocol;
pub mod session;

#[cfg(test)]
mod tests;
