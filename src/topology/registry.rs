use super::types::{ConnectivityChange, LinkState, Peer, TopologyError};
use crate::clock::ProcessId;

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Per-node view of which replicas are currently reachable.
///
/// Every node owns its own registry, so several nodes can live in one process.
pub struct PeerRegistry {
    local_id: ProcessId,
    peers: DashMap<ProcessId, Peer>,
}

impl PeerRegistry {
    pub fn new(local_id: ProcessId) -> Arc<Self> {
        Arc::new(Self {
            local_id,
            peers: DashMap::new(),
        })
    }

    /// Creates a registry with every given peer linked up.
    pub fn with_peers(
        local_id: ProcessId,
        peers: impl IntoIterator<Item = (ProcessId, SocketAddr)>,
    ) -> Arc<Self> {
        let registry = Self::new(local_id);
        for (id, addr) in peers {
            if id == local_id {
                tracing::warn!("Ignoring self entry {} in peer list", id);
                continue;
            }
            registry.peers.insert(
                id,
                Peer {
                    id,
                    http_addr: addr,
                    link: LinkState::Up,
                },
            );
        }
        registry
    }

    pub fn local_id(&self) -> ProcessId {
        self.local_id
    }

    pub fn apply(&self, change: &ConnectivityChange) -> Result<bool, TopologyError> {
        match change.state {
            LinkState::Up => self.link_up(change.peer, change.addr),
            LinkState::Down => Ok(self.link_down(change.peer)),
        }
    }

    /// Brings the link to `id` up, registering the peer if `addr` is given.
    /// Returns whether anything changed.
    pub fn link_up(&self, id: ProcessId, addr: Option<SocketAddr>) -> Result<bool, TopologyError> {
        if id == self.local_id {
            return Err(TopologyError::SelfLink(id));
        }

        match self.peers.get_mut(&id) {
            Some(mut peer) => {
                let moved = addr.is_some_and(|a| a != peer.http_addr);
                if let Some(addr) = addr {
                    peer.http_addr = addr;
                }
                if peer.link == LinkState::Up && !moved {
                    tracing::debug!("Link to {} already up", id);
                    return Ok(false);
                }
                peer.link = LinkState::Up;
                tracing::info!("Link {} -> {} is up ({})", self.local_id, id, peer.http_addr);
                Ok(true)
            }
            None => {
                let addr = addr.ok_or(TopologyError::UnknownPeer(id))?;
                self.peers.insert(
                    id,
                    Peer {
                        id,
                        http_addr: addr,
                        link: LinkState::Up,
                    },
                );
                tracing::info!("Link {} -> {} created ({})", self.local_id, id, addr);
                Ok(true)
            }
        }
    }

    /// Severs the link to `id`. The peer stays known so the link can be restored
    /// without an address.
    pub fn link_down(&self, id: ProcessId) -> bool {
        match self.peers.get_mut(&id) {
            Some(mut peer) if peer.link == LinkState::Up => {
                peer.link = LinkState::Down;
                tracing::info!("Link {} -> {} severed", self.local_id, id);
                true
            }
            Some(_) => {
                tracing::debug!("Link to {} was already down", id);
                false
            }
            None => {
                tracing::debug!("Tried to sever link to unknown peer {}", id);
                false
            }
        }
    }

    pub fn get(&self, id: ProcessId) -> Option<Peer> {
        self.peers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn is_reachable(&self, id: ProcessId) -> bool {
        self.peers
            .get(&id)
            .map(|entry| entry.value().is_up())
            .unwrap_or(false)
    }

    /// Peers with an `Up` link, ordered by id.
    pub fn reachable(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self
            .peers
            .iter()
            .filter(|entry| entry.value().is_up())
            .map(|entry| entry.value().clone())
            .collect();
        peers.sort_by_key(|peer| peer.id);
        peers
    }

    pub fn all(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self
            .peers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        peers.sort_by_key(|peer| peer.id);
        peers
    }
}
