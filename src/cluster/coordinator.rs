use crate::clock::ProcessId;
use crate::config::Timeouts;
use crate::stabilize::protocol::{ENDPOINT_STABILIZE, StabilizeResponse};
use crate::storage::protocol::{ENDPOINT_STATUS, ENDPOINT_STORE, StatusResponse, StoreDumpResponse};
use crate::topology::ENDPOINT_CONNECTIVITY;
use crate::topology::transport::PeerClient;
use crate::topology::types::{ConnectivityChange, ConnectivityResponse, LinkState};

use anyhow::{Context, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;

/// External driver of a deployment: starts rounds and reshapes the link graph.
pub struct ClusterCoordinator {
    replicas: BTreeMap<ProcessId, SocketAddr>,
    transport: PeerClient,
    timeouts: Timeouts,
}

impl ClusterCoordinator {
    pub fn new(
        replicas: impl IntoIterator<Item = (ProcessId, SocketAddr)>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            replicas: replicas.into_iter().collect(),
            transport: PeerClient::new(),
            timeouts,
        }
    }

    pub fn replicas(&self) -> Vec<ProcessId> {
        self.replicas.keys().copied().collect()
    }

    fn addr_of(&self, id: ProcessId) -> anyhow::Result<SocketAddr> {
        self.replicas
            .get(&id)
            .copied()
            .ok_or_else(|| anyhow!("unknown replica {}", id))
    }

    /// Runs one round rooted at `root` and returns the replicas it covered.
    pub async fn init_stabilize(&self, root: ProcessId) -> anyhow::Result<BTreeSet<ProcessId>> {
        let addr = self.addr_of(root)?;
        let resp: StabilizeResponse = self
            .transport
            .post_json(addr, ENDPOINT_STABILIZE, &(), self.timeouts.round_policy())
            .await
            .with_context(|| format!("stabilization rooted at {} failed", root))?;

        tracing::info!("Round rooted at {} covered {:?}", root, resp.covered);
        Ok(resp.covered)
    }

    /// Stabilizes every connected component once: roots a round at the lowest uncovered
    /// replica until every replica is covered or did not answer.
    pub async fn stabilize_all(&self) -> Vec<BTreeSet<ProcessId>> {
        let mut uncovered: BTreeSet<ProcessId> = self.replicas.keys().copied().collect();
        let mut components = Vec::new();

        while let Some(root) = uncovered.first().copied() {
            uncovered.remove(&root);
            match self.init_stabilize(root).await {
                Ok(covered) => {
                    for id in &covered {
                        uncovered.remove(id);
                    }
                    components.push(covered);
                }
                Err(e) => tracing::warn!("Skipping replica {}: {:#}", root, e),
            }
        }

        tracing::info!("Stabilized {} component(s)", components.len());
        components
    }

    /// Creates the link between `a` and `b` on both endpoints.
    pub async fn connect(&self, a: ProcessId, b: ProcessId) -> anyhow::Result<()> {
        let (addr_a, addr_b) = (self.addr_of(a)?, self.addr_of(b)?);
        self.set_link(addr_a, b, Some(addr_b), LinkState::Up).await?;
        self.set_link(addr_b, a, Some(addr_a), LinkState::Up).await?;
        tracing::info!("Connected {} <-> {}", a, b);
        Ok(())
    }

    /// Severs the link between `a` and `b` on both endpoints.
    pub async fn disconnect(&self, a: ProcessId, b: ProcessId) -> anyhow::Result<()> {
        let (addr_a, addr_b) = (self.addr_of(a)?, self.addr_of(b)?);
        self.set_link(addr_a, b, None, LinkState::Down).await?;
        self.set_link(addr_b, a, None, LinkState::Down).await?;
        tracing::info!("Disconnected {} <-> {}", a, b);
        Ok(())
    }

    async fn set_link(
        &self,
        at: SocketAddr,
        peer: ProcessId,
        addr: Option<SocketAddr>,
        state: LinkState,
    ) -> anyhow::Result<bool> {
        let change = ConnectivityChange { peer, addr, state };
        let resp: ConnectivityResponse = self
            .transport
            .post_json(at, ENDPOINT_CONNECTIVITY, &change, self.timeouts.rpc_policy())
            .await
            .with_context(|| format!("link change to {} at {} failed", peer, at))?;
        Ok(resp.changed)
    }

    /// Key -> value contents of one replica.
    pub async fn dump_store(&self, id: ProcessId) -> anyhow::Result<BTreeMap<String, String>> {
        let addr = self.addr_of(id)?;
        let resp: StoreDumpResponse = self
            .transport
            .get_json(addr, ENDPOINT_STORE, self.timeouts.rpc_policy())
            .await
            .with_context(|| format!("store dump of {} failed", id))?;
        Ok(resp.entries)
    }

    pub async fn status(&self, id: ProcessId) -> anyhow::Result<StatusResponse> {
        let addr = self.addr_of(id)?;
        let resp = self
            .transport
            .get_json(addr, ENDPOINT_STATUS, self.timeouts.rpc_policy())
            .await
            .with_context(|| format!("status of {} failed", id))?;
        Ok(resp)
    }
}
