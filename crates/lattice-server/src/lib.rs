//! Lattice hub server library logic.

pub mod api_events;
pub mod api_ingest;
pub mod api_nodes;
pub mod config;
pub mod event_types;
pub mod outbound;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use lattice_db::DbPool;
use lattice_eventlog::EventTypeCatalogue;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Immutable event-type catalogue, built once at startup.
    pub catalogue: Arc<EventTypeCatalogue>,
    /// Shared HTTP client for hub-initiated calls to nodes.
    pub http: reqwest::Client,
}

/// Maximum request body size (2 MiB). Protects against OOM from oversized payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/events/ingest",
            post(api_ingest::ingest_event_handler),
        )
        .route("/api/events", get(api_events::list_events_handler))
        .route(
            "/api/event-types",
            get(api_events::list_event_types_handler),
        )
        .route(
            "/api/nodes",
            get(api_nodes::list_nodes_handler).post(api_nodes::register_node_handler),
        )
        .route("/api/nodes/options", get(api_nodes::node_options_handler))
        .route(
            "/api/nodes/{nodeId}",
            axum::routing::patch(api_nodes::update_node_handler)
                .delete(api_nodes::delete_node_handler),
        )
        .route(
            "/api/nodes/{nodeId}/rotate-keys",
            post(api_nodes::rotate_keys_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
