use causal_kv::client::session::ClientSession;
use causal_kv::cluster::coordinator::ClusterCoordinator;
use causal_kv::config::{Cli, ClientArgs, Command, ReplicaArgs, StabilizeArgs, Timeouts};
use causal_kv::server::{ReplicaNode, client_router, serve};
use causal_kv::topology::registry::PeerRegistry;

use clap::Parser;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .init();

    match cli.command {
        Command::Replica(args) => run_replica(args).await,
        Command::Client(args) => run_client(args).await,
        Command::Stabilize(args) => run_stabilize(args).await,
    }
}

async fn run_replica(args: ReplicaArgs) -> anyhow::Result<()> {
    let timeouts = Timeouts::from(&args.timeouts);
    let peers = PeerRegistry::with_peers(args.id, args.peers.iter().map(|p| (p.id, p.addr)));
    let node = ReplicaNode::new(args.id, peers.clone(), timeouts)?;

    tracing::info!("Starting replica {} on {}", args.id, args.bind);
    for peer in peers.all() {
        tracing::info!("  - peer {} at {} ({:?})", peer.id, peer.http_addr, peer.link);
    }

    // Periodic summary of the node's view.
    let stats = node.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            tracing::info!(
                "Replica {}: {} key(s), epoch {}, {} reachable peer(s)",
                stats.id(),
                stats.store.len().await,
                stats.store.epoch(),
                stats.peers.reachable().len()
            );
        }
    });

    serve(args.bind, node.router()).await
}

async fn run_client(args: ClientArgs) -> anyhow::Result<()> {
    let timeouts = Timeouts::from(&args.timeouts);
    let session = ClientSession::with_replicas(
        args.id,
        args.replicas.iter().map(|r| (r.id, r.addr)),
        timeouts,
    )?;

    tracing::info!(
        "Starting client {} on {} linked to {:?}",
        args.id,
        args.bind,
        session.replicas()
    );
    serve(args.bind, client_router(Arc::new(Mutex::new(session)))).await
}

async fn run_stabilize(args: StabilizeArgs) -> anyhow::Result<()> {
    let coordinator = ClusterCoordinator::new(
        args.replicas.iter().map(|r| (r.id, r.addr)),
        Timeouts::from(&args.timeouts),
    );

    match args.root {
        Some(root) => {
            let covered = coordinator.init_stabilize(root).await?;
            tracing::info!("Round rooted at {} covered {:?}", root, covered);
        }
        None => {
            for (i, covered) in coordinator.stabilize_all().await.iter().enumerate() {
                tracing::info!("Component {}: {:?}", i, covered);
            }
        }
    }

    for id in coordinator.replicas() {
        match coordinator.status(id).await {
            Ok(status) => tracing::info!(
                "Replica {}: epoch {}, {} key(s), reachable {:?}",
                id,
                status.epoch,
                status.keys,
                status.reachable
            ),
            Err(e) => {
                tracing::warn!("Replica {} unavailable: {:#}", id, e);
                continue;
            }
        }
        match coordinator.dump_store(id).await {
            Ok(entries) => tracing::info!("Replica {} store: {:?}", id, entries),
            Err(e) => tracing::warn!("Replica {} store unavailable: {:#}", id, e),
        }
    }

    Ok(())
}
