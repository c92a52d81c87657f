use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

use super::protocol::{
    EpochResponse, GetRequest, GetResponse, PutRequest, PutResponse, StatusResponse,
    StoreDumpResponse,
};
use super::replica::ReplicaStore;
use crate::stabilize::coordinator::Stabilizer;
use crate::topology::registry::PeerRegistry;

pub async fn handle_put(
    Extension(store): Extension<Arc<ReplicaStore>>,
    Json(req): Json<PutRequest>,
) -> Result<Json<PutResponse>, (StatusCode, String)> {
    match store.put(req.key, req.value, req.clock).await {
        Ok(outcome) => Ok(Json(PutResponse {
            conflict: outcome.conflict,
            clock: outcome.clock,
        })),
        Err(e) => {
            tracing::error!("Failed to put: {}", e);
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}

pub async fn handle_get(
    Extension(store): Extension<Arc<ReplicaStore>>,
    Json(req): Json<GetRequest>,
) -> Result<Json<GetResponse>, (StatusCode, String)> {
    match store.get(&req.key, &req.clock).await {
        Ok(outcome) => Ok(Json(GetResponse {
            record: outcome.record,
            clock: outcome.clock,
        })),
        Err(e) => {
            tracing::error!("Failed to get: {}", e);
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}

pub async fn handle_epoch(Extension(store): Extension<Arc<ReplicaStore>>) -> Json<EpochResponse> {
    Json(EpochResponse {
        epoch: store.epoch(),
    })
}

pub async fn handle_store_dump(
    Extension(store): Extension<Arc<ReplicaStore>>,
) -> Json<StoreDumpResponse> {
    Json(StoreDumpResponse {
        id: store.id(),
        entries: store.dump().await,
    })
}

pub async fn handle_status(
    Extension(store): Extension<Arc<ReplicaStore>>,
    Extension(registry): Extension<Arc<PeerRegistry>>,
    Extension(stabilizer): Extension<Arc<Stabilizer>>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        id: store.id(),
        epoch: store.epoch(),
        keys: store.len().await,
        clock: store.clock().await,
        reachable: registry.reachable().iter().map(|peer| peer.id).collect(),
        in_round: stabilizer.in_round().await,
    })
}
