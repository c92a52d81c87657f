//! Client Session
//!
//! A client process talking to whichever replicas it is currently linked to.
//!
//! ## Session Guarantees
//! - **Read-your-writes**: a Put is cached before it is sent, and a losing Put is replaced by
//!   the authoritative record the replica returns.
//! - **Monotonic reads**: a replica answer older than the newest record already observed for
//!   the key is replaced by that record.
//! - **Staleness**: every call first asks the chosen replica for its epoch; a newer epoch means a
//!   stabilization round committed, so the whole cache is dropped.

use super::cache::VersionedCache;
use crate::clock::{ClockError, ProcessId, VectorClock};
use crate::config::Timeouts;
use crate::storage::protocol::{
    ENDPOINT_EPOCH, ENDPOINT_GET, ENDPOINT_PUT, EpochResponse, GetRequest, GetResponse,
    PutRequest, PutResponse,
};
use crate::storage::record::Record;
use crate::topology::transport::{PeerClient, TransportError};

use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::net::SocketAddr;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("session {0} is not linked to any replica")]
    NoReplicas(ProcessId),
    #[error("no linked replica answered: {0}")]
    Unreachable(#[source] TransportError),
    #[error("replica rejected the call: {0}")]
    Rejected(#[source] TransportError),
    #[error(transparent)]
    Clock(#[from] ClockError),
}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        if e.is_unreachable() {
            ClientError::Unreachable(e)
        } else {
            ClientError::Rejected(e)
        }
    }
}

#[derive(Debug, Clone)]
pub struct PutResult {
    /// The record the session holds for the key after the call.
    pub record: Record,
    /// The write lost; `record` is the replica's authoritative record.
    pub conflict: bool,
    pub replica: ProcessId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    Cache,
    Replica(ProcessId),
}

#[derive(Debug, Clone)]
pub struct ReadResult {
    pub record: Option<Record>,
    pub source: ReadSource,
}

pub struct ClientSession {
    id: ProcessId,
    clock: VectorClock,
    cache: VersionedCache,
    replicas: BTreeMap<ProcessId, SocketAddr>,
    transport: PeerClient,
    timeouts: Timeouts,
}

impl ClientSession {
    pub fn new(id: ProcessId, timeouts: Timeouts) -> Result<Self, ClockError> {
        Ok(Self {
            id,
            clock: VectorClock::new(id)?,
            cache: VersionedCache::new(),
            replicas: BTreeMap::new(),
            transport: PeerClient::new(),
            timeouts,
        })
    }

    pub fn with_replicas(
        id: ProcessId,
        replicas: impl IntoIterator<Item = (ProcessId, SocketAddr)>,
        timeouts: Timeouts,
    ) -> Result<Self, ClockError> {
        let mut session = Self::new(id, timeouts)?;
        session.replicas.extend(replicas);
        Ok(session)
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    pub fn known_epoch(&self) -> u64 {
        self.cache.known_epoch()
    }

    pub fn cached(&self, key: &str) -> Option<&Record> {
        self.cache.get(key)
    }

    pub fn replicas(&self) -> Vec<ProcessId> {
        self.replicas.keys().copied().collect()
    }

    /// Links the session to `replica`. Returns whether the replica set changed.
    pub fn link(&mut self, replica: ProcessId, addr: SocketAddr) -> bool {
        let changed = self.replicas.insert(replica, addr) != Some(addr);
        if changed {
            tracing::info!("Client {} linked to replica {} ({})", self.id, replica, addr);
        }
        changed
    }

    pub fn unlink(&mut self, replica: ProcessId) -> bool {
        let changed = self.replicas.remove(&replica).is_some();
        if changed {
            tracing::info!("Client {} unlinked from replica {}", self.id, replica);
        }
        changed
    }

    pub fn invalidate(&mut self) -> usize {
        let cleared = self.cache.clear();
        tracing::debug!("Client {} dropped {} cached key(s)", self.id, cleared);
        cleared
    }

    pub async fn put(&mut self, key: &str, value: &str) -> Result<PutResult, ClientError> {
        let (replica, addr) = self.select_replica().await?;

        self.clock.increment(self.id)?;
        let candidate = Record::new(value, self.clock.clone());
        self.cache.insert_pending(key, candidate.clone());

        let request = PutRequest {
            key: key.to_string(),
            value: value.to_string(),
            clock: candidate.timestamp().clone(),
        };
        let resp: PutResponse = self
            .transport
            .post_json(addr, ENDPOINT_PUT, &request, self.timeouts.rpc_policy())
            .await?;
        self.clock.merge(&resp.clock);

        // A retried call may find its own write already stored.
        match resp.conflict {
            Some(winner) if winner != candidate => {
                tracing::debug!(
                    "Client {} lost the write of '{}' on {}, holding {}",
                    self.id,
                    key,
                    replica,
                    winner.timestamp()
                );
                self.cache.insert(key, winner.clone());
                Ok(PutResult {
                    record: winner,
                    conflict: true,
                    replica,
                })
            }
            _ => {
                self.cache.insert(key, candidate.clone());
                Ok(PutResult {
                    record: candidate,
                    conflict: false,
                    replica,
                })
            }
        }
    }

    /// Reads `key`. A cached entry is served even when no replica is reachable.
    pub async fn get(&mut self, key: &str) -> Result<ReadResult, ClientError> {
        let target = self.select_replica().await;

        if let Some(record) = self.cache.get(key) {
            if let Err(e) = &target {
                tracing::debug!("Client {} serving '{}' from cache while offline: {}", self.id, key, e);
            }
            return Ok(ReadResult {
                record: Some(record.clone()),
                source: ReadSource::Cache,
            });
        }

        let (replica, addr) = target?;
        let request = GetRequest {
            key: key.to_string(),
            clock: self.clock.clone(),
        };
        let resp: GetResponse = self
            .transport
            .post_json(addr, ENDPOINT_GET, &request, self.timeouts.rpc_policy())
            .await?;
        self.clock.merge(&resp.clock);

        let record = self.cache.floor(key, resp.record);
        if let Some(record) = &record {
            self.cache.insert(key, record.clone());
        }

        Ok(ReadResult {
            record,
            source: ReadSource::Replica(replica),
        })
    }

    /// Picks a random linked replica that answers its epoch query, falling through the
    /// unreachable ones. Invalidates the cache when the epoch moved.
    async fn select_replica(&mut self) -> Result<(ProcessId, SocketAddr), ClientError> {
        let mut targets: Vec<(ProcessId, SocketAddr)> =
            self.replicas.iter().map(|(id, addr)| (*id, *addr)).collect();
        if targets.is_empty() {
            return Err(ClientError::NoReplicas(self.id));
        }
        targets.shuffle(&mut rand::thread_rng());

        let mut last_failure = None;
        for (replica, addr) in targets {
            match self
                .transport
                .get_json::<EpochResponse>(addr, ENDPOINT_EPOCH, self.timeouts.rpc_policy())
                .await
            {
                Ok(resp) => {
                    if self.cache.observe_epoch(resp.epoch) {
                        tracing::info!(
                            "Client {} saw epoch {} on replica {}, cache invalidated",
                            self.id,
                            resp.epoch,
                            replica
                        );
                    }
                    return Ok((replica, addr));
                }
                Err(e) if e.is_unreachable() => {
                    tracing::warn!("Client {}: replica {} unreachable: {}", self.id, replica, e);
                    last_failure = Some(e);
                }
                Err(e) => return Err(ClientError::Rejected(e)),
            }
        }

        Err(last_failure
            .map(ClientError::Unreachable)
            .unwrap_or(ClientError::NoReplicas(self.id)))
    }
}
