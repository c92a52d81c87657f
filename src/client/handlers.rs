use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::protocol::{
    ClientGetResponse, ClientPutRequest, ClientPutResponse, InvalidateResponse, LinkRequest,
    LinkResponse, UnlinkRequest,
};
use super::session::{ClientError, ClientSession, ReadSource};

fn error_status(e: &ClientError) -> StatusCode {
    match e {
        ClientError::NoReplicas(_) => StatusCode::SERVICE_UNAVAILABLE,
        ClientError::Unreachable(_) | ClientError::Rejected(_) => StatusCode::BAD_GATEWAY,
        ClientError::Clock(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn handle_put(
    Extension(session): Extension<Arc<Mutex<ClientSession>>>,
    Json(req): Json<ClientPutRequest>,
) -> Result<Json<ClientPutResponse>, (StatusCode, String)> {
    let mut session = session.lock().await;
    match session.put(&req.key, &req.value).await {
        Ok(result) => Ok(Json(ClientPutResponse {
            key: req.key,
            value: result.record.value().to_string(),
            conflict: result.conflict,
            replica: result.replica,
            clock: session.clock().clone(),
        })),
        Err(e) => {
            tracing::error!("Put of '{}' failed: {}", req.key, e);
            Err((error_status(&e), e.to_string()))
        }
    }
}

pub async fn handle_get(
    Extension(session): Extension<Arc<Mutex<ClientSession>>>,
    Path(key): Path<String>,
) -> Result<Json<ClientGetResponse>, (StatusCode, String)> {
    let mut session = session.lock().await;
    match session.get(&key).await {
        Ok(result) => Ok(Json(ClientGetResponse {
            value: result.record.map(|record| record.value().to_string()),
            replica: match result.source {
                ReadSource::Cache => None,
                ReadSource::Replica(id) => Some(id),
            },
            key,
        })),
        Err(e) => {
            tracing::error!("Get of '{}' failed: {}", key, e);
            Err((error_status(&e), e.to_string()))
        }
    }
}

pub async fn handle_link(
    Extension(session): Extension<Arc<Mutex<ClientSession>>>,
    Json(req): Json<LinkRequest>,
) -> Json<LinkResponse> {
    let mut session = session.lock().await;
    let changed = session.link(req.replica, req.addr);
    Json(LinkResponse {
        changed,
        replicas: session.replicas(),
    })
}

pub async fn handle_unlink(
    Extension(session): Extension<Arc<Mutex<ClientSession>>>,
    Json(req): Json<UnlinkRequest>,
) -> Json<LinkResponse> {
    let mut session = session.lock().await;
    let changed = session.unlink(req.replica);
    Json(LinkResponse {
        changed,
        replicas: session.replicas(),
    })
}

pub async fn handle_invalidate(
    Extension(session): Extension<Arc<Mutex<ClientSession>>>,
) -> Json<InvalidateResponse> {
    let cleared = session.lock().await.invalidate();
    Json(InvalidateResponse { cleared })
}
