//! Loopback deployments for multi-node tests.

use crate::clock::{ProcessId, VectorClock};
use crate::config::Timeouts;
use crate::server::{ReplicaNode, spawn};
use crate::topology::registry::PeerRegistry;

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

/// Short timeouts so unreachable peers do not slow the suite down.
pub fn test_timeouts() -> Timeouts {
    Timeouts {
        rpc_timeout: Duration::from_millis(300),
        rpc_attempts: 1,
        gather_timeout: Duration::from_secs(3),
        round_timeout: Duration::from_secs(10),
        round_attempts: 10,
    }
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn full_mesh(n: u32) -> Vec<(u32, u32)> {
    (0..n)
        .flat_map(|a| (a + 1..n).map(move |b| (a, b)))
        .collect()
}

/// Clock owned by `owner` after `ticks` local events.
pub fn writer_clock(owner: u32, ticks: u64) -> VectorClock {
    let mut clock = VectorClock::new(ProcessId(owner)).unwrap();
    for _ in 0..ticks {
        clock.increment(ProcessId(owner)).unwrap();
    }
    clock
}

pub struct TestCluster {
    pub nodes: Vec<ReplicaNode>,
    pub addrs: Vec<SocketAddr>,
}

impl TestCluster {
    /// Starts replicas `0..n` on loopback with the given undirected links up.
    pub async fn start(n: u32, links: &[(u32, u32)]) -> Self {
        let mut listeners = Vec::new();
        let mut addrs = Vec::new();
        for _ in 0..n {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            addrs.push(listener.local_addr().unwrap());
            listeners.push(listener);
        }

        let registries: Vec<_> = (0..n).map(|i| PeerRegistry::new(ProcessId(i))).collect();
        for &(a, b) in links {
            registries[a as usize]
                .link_up(ProcessId(b), Some(addrs[b as usize]))
                .unwrap();
            registries[b as usize]
                .link_up(ProcessId(a), Some(addrs[a as usize]))
                .unwrap();
        }

        let mut nodes = Vec::new();
        for (i, (listener, registry)) in listeners.into_iter().zip(registries).enumerate() {
            let node = ReplicaNode::new(ProcessId(i as u32), registry, test_timeouts()).unwrap();
            spawn(listener, node.router()).unwrap();
            nodes.push(node);
        }

        Self { nodes, addrs }
    }

    pub fn node(&self, id: u32) -> &ReplicaNode {
        &self.nodes[id as usize]
    }

    pub fn replicas(&self) -> Vec<(ProcessId, SocketAddr)> {
        self.addrs
            .iter()
            .enumerate()
            .map(|(i, addr)| (ProcessId(i as u32), *addr))
            .collect()
    }

    /// Severs the link on both endpoints without going through HTTP.
    pub fn sever(&self, a: u32, b: u32) {
        self.node(a).peers.link_down(ProcessId(b));
        self.node(b).peers.link_down(ProcessId(a));
    }

    pub async fn value_at(&self, id: u32, key: &str) -> Option<String> {
        self.node(id)
            .store
            .get_local(key)
            .await
            .map(|record| record.value().to_string())
    }
}
