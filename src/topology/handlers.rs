use super::registry::PeerRegistry;
use super::types::{ConnectivityChange, ConnectivityResponse};

use axum::{Extension, Json, http::StatusCode};
use std::sync::Arc;

pub async fn handle_connectivity(
    Extension(registry): Extension<Arc<PeerRegistry>>,
    Json(change): Json<ConnectivityChange>,
) -> Result<Json<ConnectivityResponse>, (StatusCode, String)> {
    tracing::debug!(
        "Connectivity change on {}: {} -> {:?}",
        registry.local_id(),
        change.peer,
        change.state
    );

    match registry.apply(&change) {
        Ok(changed) => Ok(Json(ConnectivityResponse { changed })),
        Err(e) => {
            tracing::warn!("Rejected connectivity change: {}", e);
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
    }
}
