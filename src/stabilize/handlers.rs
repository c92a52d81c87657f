use axum::{
    Extension, Json,
    body::Bytes,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::coordinator::{StabilizeError, Stabilizer};
use super::protocol::{
    ClaimRequest, ReleaseRequest, ReleaseResponse, ScatterRequest, ScatterResponse,
    StabilizeResponse,
};
use crate::clock::ProcessId;
use crate::topology::registry::PeerRegistry;

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, (StatusCode, String)> {
    bincode::deserialize(body).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

fn bincode_reply<T: Serialize>(value: &T) -> Response {
    match bincode::serialize(value) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response(),
        Err(e) => {
            tracing::error!("Failed to encode reply: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Calls from peers this node considers down are refused, so a partition holds in both
/// directions.
fn ensure_reachable(registry: &PeerRegistry, sender: ProcessId) -> Result<(), (StatusCode, String)> {
    if registry.is_reachable(sender) {
        Ok(())
    } else {
        tracing::debug!("Refusing call from unreachable peer {}", sender);
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            format!("peer {} is not reachable from {}", sender, registry.local_id()),
        ))
    }
}

pub async fn handle_claim(
    Extension(stabilizer): Extension<Arc<Stabilizer>>,
    Extension(registry): Extension<Arc<PeerRegistry>>,
    body: Bytes,
) -> Result<Response, (StatusCode, String)> {
    let req: ClaimRequest = decode(&body)?;
    ensure_reachable(&registry, req.caller)?;

    let reply = stabilizer.handle_claim(req).await;
    Ok(bincode_reply(&reply))
}

pub async fn handle_scatter(
    Extension(stabilizer): Extension<Arc<Stabilizer>>,
    Extension(registry): Extension<Arc<PeerRegistry>>,
    body: Bytes,
) -> Result<Response, (StatusCode, String)> {
    let req: ScatterRequest = decode(&body)?;
    ensure_reachable(&registry, req.sender)?;

    match stabilizer
        .scatter(req.round, Some(req.sender), &req.table)
        .await
    {
        Ok(applied) => Ok(bincode_reply(&ScatterResponse { applied })),
        Err(e) => {
            tracing::warn!("Rejected scatter from {}: {}", req.sender, e);
            Err((StatusCode::CONFLICT, e.to_string()))
        }
    }
}

pub async fn handle_release(
    Extension(stabilizer): Extension<Arc<Stabilizer>>,
    Extension(registry): Extension<Arc<PeerRegistry>>,
    Json(req): Json<ReleaseRequest>,
) -> Result<Json<ReleaseResponse>, (StatusCode, String)> {
    ensure_reachable(&registry, req.sender)?;

    let released = stabilizer.release(req.round, Some(req.sender)).await;
    Ok(Json(ReleaseResponse { released }))
}

pub async fn handle_stabilize(
    Extension(stabilizer): Extension<Arc<Stabilizer>>,
) -> Result<Json<StabilizeResponse>, (StatusCode, String)> {
    match stabilizer.stabilize_with_retry().await {
        Ok(covered) => Ok(Json(StabilizeResponse { covered })),
        Err(e @ StabilizeError::RoundInProgress { .. }) => {
            Err((StatusCode::CONFLICT, e.to_string()))
        }
        Err(e) => {
            tracing::error!("Stabilization failed: {}", e);
            Err((StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}
