//! Signed-event ingestion from nodes.
//!
//! A node submits the raw JSON string it signed plus a detached
//! signature. Verifying over the raw bytes (rather than re-serialized
//! JSON) sidesteps canonicalization mismatches between the node's
//! serializer and ours: the envelope is only parsed after the signature
//! checks out.

use crate::AppState;
use axum::{extract::Extension, Json};
use lattice_eventlog::{append_event, EventLogError, EventLogItem, NewEvent};
use lattice_nodes::NodeError;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the ingestion endpoint.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("database pool error: {0}")]
    Pool(String),
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("message verification failed: {0}")]
    Verification(NodeError),
    #[error("malformed event message: {0}")]
    MalformedMessage(#[from] serde_json::Error),
    #[error("event rejected: {0}")]
    EventLog(#[from] EventLogError),
    #[error("node registry error: {0}")]
    Registry(NodeError),
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl axum::response::IntoResponse for IngestError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            IngestError::UnknownNode(_) => StatusCode::NOT_FOUND,
            IngestError::Verification(_) => StatusCode::UNAUTHORIZED,
            IngestError::MalformedMessage(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IngestError::EventLog(EventLogError::UnregisteredEventType(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Request body for `POST /api/events/ingest`.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// Base URL of the submitting node. Resolved against the registry;
    /// an unregistered URL is rejected, not auto-registered.
    pub node_url: String,
    /// The raw JSON event envelope exactly as the node signed it:
    /// `{"action_name": ..., "timestamp": ..., "data": ...}`.
    pub message: String,
    /// Hex-encoded detached Ed25519 signature over `message`.
    pub signature: String,
}

/// The signed event envelope carried inside [`IngestRequest::message`].
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    action_name: String,
    timestamp: i64,
    data: serde_json::Value,
}

/// Handler for `POST /api/events/ingest`.
pub async fn ingest_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<IngestRequest>,
) -> Result<Json<EventLogItem>, IngestError> {
    let item = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| IngestError::Pool(e.to_string()))?;

        // 1. Resolve the claimed node. Unknown is an explicit absence.
        let node = lattice_nodes::get_node_by_url(&conn, &payload.node_url)
            .map_err(IngestError::Registry)?
            .ok_or_else(|| IngestError::UnknownNode(payload.node_url.clone()))?;

        // 2. Verify the detached signature against the node's public key
        //    before trusting a single byte of the message.
        node.verify_signed_message(payload.message.as_bytes(), &payload.signature)
            .map_err(|e| {
                // Repeated failures here are the observability signal for a
                // misbehaving or misconfigured node; they never deregister it.
                tracing::warn!(
                    node_id = node.id(),
                    node_url = %node.url(),
                    error = %e,
                    "rejected event with invalid signature"
                );
                IngestError::Verification(e)
            })?;

        // 3. Only now parse the envelope and append.
        let envelope: EventEnvelope = serde_json::from_str(&payload.message)?;
        let event = NewEvent::at(
            node.id(),
            envelope.action_name,
            envelope.timestamp,
            envelope.data,
        );
        let item = append_event(&conn, &state.catalogue, &event)?;

        tracing::info!(
            event_id = item.id,
            node_id = node.id(),
            action_name = %item.action_name,
            "ingested event"
        );

        Ok::<_, IngestError>(item)
    })
    .await
    .map_err(|e| IngestError::Join(e.to_string()))??;

    Ok(Json(item))
}
