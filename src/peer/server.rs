//! Peer RPC dispatch.
//!
//! Maps inbound peer calls back onto local group operations: Get runs the
//! full group lookup (both tiers, then the load path), Set and Delete apply
//! directly to the local tiers. These handlers are the bridge between the
//! Axum router and the group controller.

use super::protocol::{
    nanos_to_expire, GetResponse, KeyRequest, SetRequest, ENDPOINT_DELETE, ENDPOINT_GET,
    ENDPOINT_SET,
};
use crate::cache::ByteView;
use crate::group::{Registry, Tier};
use axum::body::Bytes;
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use std::sync::Arc;

/// Builds the peer-facing router. Mounted on the node's `--bind` address.
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route(ENDPOINT_GET, post(handle_peer_get))
        .route(ENDPOINT_SET, post(handle_peer_set))
        .route(ENDPOINT_DELETE, post(handle_peer_delete))
        .layer(Extension(registry))
}

/// Get: resolve the group, run the full query path, answer with the view
/// bytes. Unknown groups are a 404 so callers can tell them from load
/// failures.
async fn handle_peer_get(
    Extension(registry): Extension<Arc<Registry>>,
    body: Bytes,
) -> (StatusCode, Vec<u8>) {
    let req: KeyRequest = match bincode::deserialize(&body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("failed to decode peer get request: {}", e);
            return (StatusCode::BAD_REQUEST, Vec::new());
        }
    };

    let Some(group) = registry.get_group(&req.group) else {
        return (StatusCode::NOT_FOUND, req.group.into_bytes());
    };

    match group.query(&req.key).await {
        Ok(view) => match bincode::serialize(&GetResponse {
            value: view.to_vec(),
        }) {
            Ok(encoded) => (StatusCode::OK, encoded),
            Err(e) => {
                tracing::error!("failed to encode peer get response: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
            }
        },
        Err(e) => {
            tracing::warn!("peer get {:?}/{:?} failed: {}", req.group, req.key, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string().into_bytes(),
            )
        }
    }
}

/// Set: resolve the group and write into the authoritative tier. The wire
/// expiry of zero decodes to "never".
async fn handle_peer_set(
    Extension(registry): Extension<Arc<Registry>>,
    body: Bytes,
) -> (StatusCode, Vec<u8>) {
    let req: SetRequest = match bincode::deserialize(&body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("failed to decode peer set request: {}", e);
            return (StatusCode::BAD_REQUEST, Vec::new());
        }
    };

    let Some(group) = registry.get_group(&req.group) else {
        return (StatusCode::NOT_FOUND, req.group.into_bytes());
    };

    group.local_set(
        &req.key,
        ByteView::from(req.value),
        nanos_to_expire(req.expire),
        Tier::Main,
    );
    (StatusCode::OK, Vec::new())
}

/// Delete: resolve the group and drop the key from both tiers.
async fn handle_peer_delete(
    Extension(registry): Extension<Arc<Registry>>,
    body: Bytes,
) -> (StatusCode, Vec<u8>) {
    let req: KeyRequest = match bincode::deserialize(&body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("failed to decode peer delete request: {}", e);
            return (StatusCode::BAD_REQUEST, Vec::new());
        }
    };

    let Some(group) = registry.get_group(&req.group) else {
        return (StatusCode::NOT_FOUND, req.group.into_bytes());
    };

    group.local_remove(&req.key);
    (StatusCode::OK, Vec::new())
}
