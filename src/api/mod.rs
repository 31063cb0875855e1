//! Front-end HTTP API.
//!
//! Exposes the cache to end users as plain HTTP: values travel as raw bytes,
//! writes and deletes answer with a JSON ack. These handlers translate
//! requests into group operations; they carry no cache logic of their own.

use crate::error::CacheError;
use crate::group::Registry;
use crate::peer::protocol::nanos_to_expire;
use axum::body::Bytes;
use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Write options carried in the query string.
#[derive(Debug, Deserialize)]
pub struct SetParams {
    /// Absolute expiry as nanoseconds since the Unix epoch; 0 or absent
    /// means no expiry.
    #[serde(default)]
    pub expire_nanos: i64,
    /// Keep a local hot-tier copy when the key is remote-owned.
    #[serde(default)]
    pub mirror: bool,
}

/// Acknowledgment for writes and deletes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Builds the user-facing router.
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route(
            "/api/:group/:key",
            get(handle_query).put(handle_set).delete(handle_remove),
        )
        .layer(Extension(registry))
}

async fn handle_query(
    Extension(registry): Extension<Arc<Registry>>,
    Path((group_name, key)): Path<(String, String)>,
) -> (StatusCode, Vec<u8>) {
    let Some(group) = registry.get_group(&group_name) else {
        return (StatusCode::NOT_FOUND, group_name.into_bytes());
    };

    match group.query(&key).await {
        Ok(view) => (StatusCode::OK, view.to_vec()),
        Err(e @ CacheError::OriginMiss { .. }) => {
            (StatusCode::NOT_FOUND, e.to_string().into_bytes())
        }
        Err(e) => {
            tracing::error!("query {}/{} failed: {}", group_name, key, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string().into_bytes(),
            )
        }
    }
}

async fn handle_set(
    Extension(registry): Extension<Arc<Registry>>,
    Path((group_name, key)): Path<(String, String)>,
    Query(params): Query<SetParams>,
    body: Bytes,
) -> (StatusCode, Json<ApiAck>) {
    let Some(group) = registry.get_group(&group_name) else {
        return not_found(&group_name);
    };

    match group
        .set(
            &key,
            body.to_vec(),
            nanos_to_expire(params.expire_nanos),
            params.mirror,
        )
        .await
    {
        Ok(()) => ok(),
        Err(e) => {
            tracing::error!("set {}/{} failed: {}", group_name, key, e);
            failed(e)
        }
    }
}

async fn handle_remove(
    Extension(registry): Extension<Arc<Registry>>,
    Path((group_name, key)): Path<(String, String)>,
) -> (StatusCode, Json<ApiAck>) {
    let Some(group) = registry.get_group(&group_name) else {
        return not_found(&group_name);
    };

    match group.remove(&key).await {
        Ok(()) => ok(),
        Err(e) => {
            tracing::error!("remove {}/{} failed: {}", group_name, key, e);
            failed(e)
        }
    }
}

fn ok() -> (StatusCode, Json<ApiAck>) {
    (
        StatusCode::OK,
        Json(ApiAck {
            success: true,
            error: None,
        }),
    )
}

fn not_found(group_name: &str) -> (StatusCode, Json<ApiAck>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiAck {
            success: false,
            error: Some(format!("no such group: {}", group_name)),
        }),
    )
}

fn failed(e: CacheError) -> (StatusCode, Json<ApiAck>) {
    let status = match e {
        CacheError::EmptyKey => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiAck {
            success: false,
            error: Some(e.to_string()),
        }),
    )
}
