// SPDX-License-Identifier: MIT OR Apache-2.0
//! The axum application serving the façade.

use crate::HttpBridge;
use axum::extract::{ConnectInfo, FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::response::Json;
use axum::Router;
use axum::routing::get;
use serde_json::Value;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Remote peer address, when the transport recorded one.
struct Peer(Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for Peer {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        Ok(Peer(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string()),
        ))
    }
}

async fn get_root(
    State(bridge): State<Arc<HttpBridge>>,
    Query(params): Query<BTreeMap<String, String>>,
    Peer(peer): Peer,
) -> Json<Value> {
    Json(bridge.handle_get("", &params, peer.as_deref()))
}

async fn get_path(
    State(bridge): State<Arc<HttpBridge>>,
    Path(path): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    Peer(peer): Peer,
) -> Json<Value> {
    Json(bridge.handle_get(&path, &params, peer.as_deref()))
}

/// `charset=` parameter of the Content-Type header, when present.
fn charset_of(headers: &axum::http::HeaderMap) -> Option<String> {
    let content_type = headers.get(axum::http::header::CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').find_map(|part| {
        part.trim()
            .strip_prefix("charset=")
            .map(|cs| cs.trim_matches('"').to_owned())
    })
}

async fn post_any(
    State(bridge): State<Arc<HttpBridge>>,
    Query(params): Query<BTreeMap<String, String>>,
    Peer(peer): Peer,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Json<Value> {
    let encoding = charset_of(&headers);
    Json(bridge.handle_post(&body, encoding.as_deref(), &params, peer.as_deref()))
}

/// Mount the façade under `context` (e.g. `/api`) with tracing and
/// permissive CORS, the way the bundled server serves it.
#[must_use]
pub fn build_app(bridge: Arc<HttpBridge>, context: &str) -> Router {
    let context = context.trim_end_matches('/');
    let root = if context.is_empty() { "/" } else { context };
    Router::new()
        .route(root, get(get_root).post(post_any))
        .route(&format!("{context}/{{*path}}"), get(get_path).post(post_any))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(bridge)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
