//! Stabilization Coordinator
//!
//! Anti-entropy round run by a replica. Any replica may act as root.
//!
//! ## Round Lifecycle
//! 1. **Gather**: the root claims itself, then claims every reachable peer. A claimed peer claims
//!    its own reachable peers (except its parent) and so on, building a spanning tree on the fly.
//!    The claimed flag is a test-and-set, so each node joins at most one tree and cycles in the
//!    connectivity graph are cut. Every node replies with the merge of its subtree's tables.
//! 2. **Scatter**: the root pushes the merged winners down the same tree. Each node commits them,
//!    forwards them to its children, waits for its subtree, then clears its round state.
//! 3. **Release**: if any node of the tree was held by a competing round, the root abandons
//!    instead of scattering; every member clears its state and the root retries later.

use super::protocol::{
    ClaimReply, ClaimRequest, ENDPOINT_CLAIM, ENDPOINT_RELEASE, ENDPOINT_SCATTER, ReleaseRequest,
    ReleaseResponse, RoundId, ScatterRequest, ScatterResponse,
};
use super::round::{ClaimOutcome, RoundState};
use crate::clock::ProcessId;
use crate::config::Timeouts;
use crate::storage::record::{Table, merge_tables};
use crate::storage::replica::ReplicaStore;
use crate::topology::registry::PeerRegistry;
use crate::topology::transport::{CallPolicy, PeerClient, TransportError};

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StabilizeError {
    #[error("node {node} is already part of round {round}")]
    RoundInProgress { node: ProcessId, round: RoundId },
    #[error("round {0} collided with a concurrent round and was abandoned")]
    Contended(RoundId),
    #[error("node {node} is not part of round {round} under that parent")]
    UnknownRound { node: ProcessId, round: RoundId },
}

/// What a node knows after its subtree answered.
struct Gathered {
    table: Table,
    members: BTreeSet<ProcessId>,
    contended: bool,
}

pub struct Stabilizer {
    store: Arc<ReplicaStore>,
    peers: Arc<PeerRegistry>,
    transport: PeerClient,
    timeouts: Timeouts,
    state: Mutex<RoundState>,
}

impl Stabilizer {
    pub fn new(
        store: Arc<ReplicaStore>,
        peers: Arc<PeerRegistry>,
        transport: PeerClient,
        timeouts: Timeouts,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            peers,
            transport,
            timeouts,
            state: Mutex::new(RoundState::default()),
        })
    }

    pub fn id(&self) -> ProcessId {
        self.store.id()
    }

    pub async fn in_round(&self) -> bool {
        self.state.lock().await.is_claimed()
    }

    /// Runs one round rooted at this node. Returns the ids of every node the round covered.
    pub async fn init_stabilize(&self) -> Result<BTreeSet<ProcessId>, StabilizeError> {
        let round = RoundId::new();
        {
            let mut state = self.state.lock().await;
            match state.try_claim(round, None, self.timeouts.round_timeout) {
                ClaimOutcome::Claimed => {}
                ClaimOutcome::SameRound | ClaimOutcome::OtherRound(_) => {
                    let current = state.current_round().unwrap_or(round);
                    tracing::warn!(
                        "Node {} refused to start a round: already in round {}",
                        self.id(),
                        current
                    );
                    return Err(StabilizeError::RoundInProgress {
                        node: self.id(),
                        round: current,
                    });
                }
            }
        }

        tracing::info!("Node {} starting round {} as root", self.id(), round);
        let gathered = self
            .gather(round, None, self.timeouts.gather_timeout)
            .await;

        if gathered.contended {
            tracing::warn!(
                "Round {} met a competing round, releasing {} node(s)",
                round,
                gathered.members.len()
            );
            self.release(round, None).await;
            return Err(StabilizeError::Contended(round));
        }

        tracing::info!(
            "Round {} gathered {} key(s) from {:?}",
            round,
            gathered.table.len(),
            gathered.members
        );
        self.scatter(round, None, &gathered.table).await?;
        tracing::info!("Round {} complete", round);

        Ok(gathered.members)
    }

    /// [`Stabilizer::init_stabilize`], retrying contended rounds with jittered backoff.
    /// A concurrent-round conflict on this node is returned immediately.
    pub async fn stabilize_with_retry(&self) -> Result<BTreeSet<ProcessId>, StabilizeError> {
        let attempts = self.timeouts.round_attempts.max(1);
        let mut attempt = 1;
        let mut delay_ms = 150u64;

        loop {
            match self.init_stabilize().await {
                Err(StabilizeError::Contended(round)) if attempt < attempts => {
                    let jitter = rand::random::<u64>() % 100;
                    tracing::debug!(
                        "Round {} contended (attempt {}/{}), backing off {}ms",
                        round,
                        attempt,
                        attempts,
                        delay_ms + jitter
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Handles a claim from `req.caller`.
    pub async fn handle_claim(&self, req: ClaimRequest) -> ClaimReply {
        let outcome = self.state.lock().await.try_claim(
            req.round,
            Some(req.caller),
            self.timeouts.round_timeout,
        );

        match outcome {
            ClaimOutcome::SameRound => {
                tracing::debug!(
                    "Node {} already in round {}, not a child of {}",
                    self.id(),
                    req.round,
                    req.caller
                );
                ClaimReply::NotChild
            }
            ClaimOutcome::OtherRound(other) => {
                tracing::debug!(
                    "Node {} held by round {}, refusing round {}",
                    self.id(),
                    other,
                    req.round
                );
                ClaimReply::Contended
            }
            ClaimOutcome::Claimed => {
                tracing::debug!(
                    "Node {} claimed by {} for round {}",
                    self.id(),
                    req.caller,
                    req.round
                );
                let gathered = self
                    .gather(
                        req.round,
                        Some(req.caller),
                        Duration::from_millis(req.budget_ms),
                    )
                    .await;
                ClaimReply::Child {
                    table: gathered.table,
                    members: gathered.members,
                    contended: gathered.contended,
                }
            }
        }
    }

    /// Claims every reachable peer except `parent`, joins on all of them and merges the
    /// subtree tables with our own.
    async fn gather(&self, round: RoundId, parent: Option<ProcessId>, budget: Duration) -> Gathered {
        let mut gathered = Gathered {
            table: Table::new(),
            members: BTreeSet::from([self.id()]),
            contended: false,
        };

        let targets: Vec<_> = self
            .peers
            .reachable()
            .into_iter()
            .filter(|peer| Some(peer.id) != parent)
            .collect();
        let child_budget = budget.saturating_sub(self.timeouts.rpc_timeout);

        if targets.is_empty() {
            tracing::debug!("Node {} has no peers to claim in round {}", self.id(), round);
        } else if child_budget.is_zero() {
            tracing::warn!(
                "Node {} out of gather budget in round {}, skipping {} peer(s)",
                self.id(),
                round,
                targets.len()
            );
        } else {
            let mut calls = JoinSet::new();
            for peer in targets {
                let transport = self.transport.clone();
                let request = ClaimRequest {
                    round,
                    caller: self.id(),
                    budget_ms: child_budget.as_millis() as u64,
                };
                calls.spawn(async move {
                    let reply = transport
                        .post_bincode::<_, ClaimReply>(
                            peer.http_addr,
                            ENDPOINT_CLAIM,
                            &request,
                            CallPolicy::once(budget),
                        )
                        .await;
                    (peer.id, peer.http_addr, reply)
                });
            }

            while let Some(joined) = calls.join_next().await {
                let (peer, addr, reply) = match joined {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!("Claim task failed: {}", e);
                        continue;
                    }
                };
                self.absorb_claim_reply(round, peer, addr, reply, &mut gathered)
                    .await;
            }
        }

        let own = self.store.snapshot().await;
        merge_tables(&mut gathered.table, &own);
        gathered
    }

    async fn absorb_claim_reply(
        &self,
        round: RoundId,
        peer: ProcessId,
        addr: SocketAddr,
        reply: Result<ClaimReply, TransportError>,
        gathered: &mut Gathered,
    ) {
        match reply {
            Ok(ClaimReply::Child {
                table,
                members,
                contended,
            }) => {
                if !self.state.lock().await.add_child(round, peer, addr) {
                    tracing::warn!(
                        "Node {} left round {} before child {} answered, releasing it",
                        self.id(),
                        round,
                        peer
                    );
                    // The child still names us as parent; free its subtree now.
                    self.spawn_release(addr, round);
                    return;
                }
                merge_tables(&mut gathered.table, &table);
                gathered.members.extend(members);
                gathered.contended |= contended;
            }
            Ok(ClaimReply::NotChild) => {
                tracing::debug!("Peer {} already in round {}", peer, round);
            }
            Ok(ClaimReply::Contended) => {
                tracing::debug!("Peer {} held by a competing round", peer);
                gathered.contended = true;
            }
            Err(e) => {
                tracing::warn!("Peer {} did not participate in round {}: {}", peer, round, e);
                if e.is_unreachable() {
                    // The peer may have joined the tree before the reply was lost.
                    self.spawn_release(addr, round);
                }
            }
        }
    }

    /// Forwards `table` to every node below this one, commits it locally, then leaves the round.
    ///
    /// `from` is the parent delivering the scatter, `None` on the root.
    pub async fn scatter(
        &self,
        round: RoundId,
        from: Option<ProcessId>,
        table: &Table,
    ) -> Result<usize, StabilizeError> {
        let children = self.children_for(round, from).await?;

        let request = Arc::new(ScatterRequest {
            round,
            sender: self.id(),
            table: table.clone(),
        });
        let mut calls = JoinSet::new();
        for (child, addr) in children {
            let transport = self.transport.clone();
            let request = request.clone();
            let policy = CallPolicy::once(self.timeouts.gather_timeout);
            calls.spawn(async move {
                let reply = transport
                    .post_bincode::<_, ScatterResponse>(addr, ENDPOINT_SCATTER, &*request, policy)
                    .await;
                (child, reply)
            });
        }

        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((child, Ok(reply))) => {
                    tracing::debug!("Child {} applied {} key(s)", child, reply.applied);
                }
                Ok((child, Err(e))) => {
                    tracing::warn!("Scatter of round {} to {} failed: {}", round, child, e);
                }
                Err(e) => tracing::error!("Scatter task failed: {}", e),
            }
        }

        let applied = self.store.apply_committed(table).await;
        self.state.lock().await.finish(round);
        Ok(applied)
    }

    /// Abandons `round` on this node and every node below it. Returns whether this node was
    /// in the round.
    pub async fn release(&self, round: RoundId, from: Option<ProcessId>) -> bool {
        let children = match self.children_for(round, from).await {
            Ok(children) => children,
            Err(e) => {
                tracing::debug!("Ignoring release: {}", e);
                return false;
            }
        };

        let mut calls = JoinSet::new();
        for (child, addr) in children {
            let transport = self.transport.clone();
            let request = ReleaseRequest {
                round,
                sender: self.id(),
            };
            let policy = CallPolicy::once(self.timeouts.gather_timeout);
            calls.spawn(async move {
                let reply = transport
                    .post_json::<_, ReleaseResponse>(addr, ENDPOINT_RELEASE, &request, policy)
                    .await;
                (child, reply)
            });
        }

        while let Some(joined) = calls.join_next().await {
            if let Ok((child, Err(e))) = joined {
                tracing::warn!("Release of round {} to {} failed: {}", round, child, e);
            }
        }

        let released = self.state.lock().await.finish(round);
        tracing::debug!("Node {} released round {}", self.id(), round);
        released
    }

    fn spawn_release(&self, addr: SocketAddr, round: RoundId) {
        let transport = self.transport.clone();
        let request = ReleaseRequest {
            round,
            sender: self.id(),
        };
        let policy = CallPolicy::once(self.timeouts.rpc_timeout);
        tokio::spawn(async move {
            if let Err(e) = transport
                .post_json::<_, ReleaseResponse>(addr, ENDPOINT_RELEASE, &request, policy)
                .await
            {
                tracing::debug!("Best-effort release to {} failed: {}", addr, e);
            }
        });
    }

    async fn children_for(
        &self,
        round: RoundId,
        from: Option<ProcessId>,
    ) -> Result<Vec<(ProcessId, SocketAddr)>, StabilizeError> {
        let state = self.state.lock().await;
        match state.children_of(round) {
            Some(children) if state.parent() == from => Ok(children),
            _ => Err(StabilizeError::UnknownRound {
                node: self.id(),
                round,
            }),
        }
    }
}
