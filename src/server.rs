//! Node Servers
//!
//! Wires the per-node components into axum routers. A replica node serves the client-facing
//! Put/Get calls, the stabilization peer calls and the coordinator surface; a client node
//! exposes one `ClientSession`.

use crate::client::handlers as client_handlers;
use crate::client::protocol::{
    ENDPOINT_CLIENT_GET, ENDPOINT_CLIENT_PUT, ENDPOINT_INVALIDATE, ENDPOINT_LINK, ENDPOINT_UNLINK,
};
use crate::client::session::ClientSession;
use crate::clock::{ClockError, ProcessId};
use crate::config::Timeouts;
use crate::stabilize::coordinator::Stabilizer;
use crate::stabilize::handlers as stabilize_handlers;
use crate::stabilize::protocol::{
    ENDPOINT_CLAIM, ENDPOINT_RELEASE, ENDPOINT_SCATTER, ENDPOINT_STABILIZE,
};
use crate::storage::handlers as storage_handlers;
use crate::storage::protocol::{
    ENDPOINT_EPOCH, ENDPOINT_GET, ENDPOINT_PUT, ENDPOINT_STATUS, ENDPOINT_STORE,
};
use crate::storage::replica::ReplicaStore;
use crate::topology::ENDPOINT_CONNECTIVITY;
use crate::topology::handlers::handle_connectivity;
use crate::topology::registry::PeerRegistry;
use crate::topology::transport::PeerClient;

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Everything one replica process owns.
#[derive(Clone)]
pub struct ReplicaNode {
    pub store: Arc<ReplicaStore>,
    pub peers: Arc<PeerRegistry>,
    pub stabilizer: Arc<Stabilizer>,
}

impl ReplicaNode {
    pub fn new(
        id: ProcessId,
        peers: Arc<PeerRegistry>,
        timeouts: Timeouts,
    ) -> Result<Self, ClockError> {
        let store = Arc::new(ReplicaStore::new(id)?);
        let stabilizer = Stabilizer::new(store.clone(), peers.clone(), PeerClient::new(), timeouts);
        Ok(Self {
            store,
            peers,
            stabilizer,
        })
    }

    pub fn id(&self) -> ProcessId {
        self.store.id()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(ENDPOINT_PUT, post(storage_handlers::handle_put))
            .route(ENDPOINT_GET, post(storage_handlers::handle_get))
            .route(ENDPOINT_EPOCH, get(storage_handlers::handle_epoch))
            .route(ENDPOINT_STORE, get(storage_handlers::handle_store_dump))
            .route(ENDPOINT_STATUS, get(storage_handlers::handle_status))
            .route(ENDPOINT_CONNECTIVITY, post(handle_connectivity))
            .route(ENDPOINT_CLAIM, post(stabilize_handlers::handle_claim))
            .route(ENDPOINT_SCATTER, post(stabilize_handlers::handle_scatter))
            .route(ENDPOINT_RELEASE, post(stabilize_handlers::handle_release))
            .route(ENDPOINT_STABILIZE, post(stabilize_handlers::handle_stabilize))
            .layer(Extension(self.store.clone()))
            .layer(Extension(self.peers.clone()))
            .layer(Extension(self.stabilizer.clone()))
    }
}

pub fn client_router(session: Arc<Mutex<ClientSession>>) -> Router {
    Router::new()
        .route(ENDPOINT_CLIENT_PUT, post(client_handlers::handle_put))
        .route(ENDPOINT_CLIENT_GET, get(client_handlers::handle_get))
        .route(ENDPOINT_LINK, post(client_handlers::handle_link))
        .route(ENDPOINT_UNLINK, post(client_handlers::handle_unlink))
        .route(ENDPOINT_INVALIDATE, post(client_handlers::handle_invalidate))
        .layer(Extension(session))
}

/// Binds `bind` and serves `app` until the process exits.
pub async fn serve(bind: SocketAddr, app: Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Serves `app` on an already bound listener in a background task and returns its address.
pub fn spawn(listener: TcpListener, app: Router) -> anyhow::Result<SocketAddr> {
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server on {} stopped: {}", addr, e);
        }
    });
    Ok(addr)
}
