//! Node administration endpoints.
//!
//! Registration is the only way a node comes into existence; first
//! contact with an unknown URL never auto-registers. Registration
//! returns the generated key material exactly once so an operator can
//! hand the private key and secret to the node; listings afterwards
//! expose only the public half. Every mutation is recorded as a
//! hub-local entry in the event log.

use crate::AppState;
use axum::{
    extract::{Extension, Path},
    Json,
};
use lattice_eventlog::{append_event, NewEvent, HUB_NODE_ID};
use lattice_nodes::{DeleteOutcome, Node, NodeError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the node admin endpoints.
#[derive(Debug, Error)]
pub enum NodesApiError {
    #[error("database pool error: {0}")]
    Pool(String),
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl axum::response::IntoResponse for NodesApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            NodesApiError::Node(NodeError::NotFound(_)) => StatusCode::NOT_FOUND,
            NodesApiError::Node(NodeError::InvalidUrl(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            NodesApiError::Node(NodeError::DuplicateUrl(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// Public view of a node, safe for listings.
#[derive(Debug, Serialize)]
pub struct NodeSummary {
    pub id: i64,
    pub url: String,
    pub public_key: Option<String>,
    pub has_credentials: bool,
}

impl From<&Node> for NodeSummary {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id(),
            url: node.url().to_string(),
            public_key: node.public_key().map(str::to_string),
            has_credentials: node.app_user().is_some() && node.app_pass().is_some(),
        }
    }
}

/// Response for node registration: includes the private material, once.
#[derive(Debug, Serialize)]
pub struct RegisteredNode {
    pub id: i64,
    pub url: String,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterNodeRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNodeRequest {
    pub url: Option<String>,
    pub app_user: Option<String>,
    pub app_pass: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RotatedKeys {
    pub id: i64,
    pub public_key: String,
    pub private_key: String,
}

#[derive(Debug, Serialize)]
pub struct DeletedNode {
    pub id: i64,
    /// "tombstoned" when stored events still reference the node,
    /// "deleted" when the record was removed outright.
    pub outcome: &'static str,
}

/// Records a hub-local administrative event. Failure to record never
/// fails the admin operation itself; it is logged and dropped.
fn record_admin_event(state: &AppState, conn: &rusqlite::Connection, action: &str, url: &str) {
    let event = NewEvent::new(HUB_NODE_ID, action, serde_json::json!({ "url": url }));
    if let Err(e) = append_event(conn, &state.catalogue, &event) {
        tracing::warn!(action, url, error = %e, "failed to record hub admin event");
    }
}

/// One entry in the node filter address book.
#[derive(Debug, Serialize)]
pub struct NodeOption {
    pub id: i64,
    pub label: String,
}

/// Handler for `GET /api/nodes/options`.
///
/// The address book a filter UI populates its node selector from: the
/// hub sentinel entry first, then every live node.
pub async fn node_options_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<NodeOption>>, NodesApiError> {
    let options = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| NodesApiError::Pool(e.to_string()))?;
        let nodes = lattice_nodes::get_all_nodes(&conn)?;

        let mut options = Vec::with_capacity(nodes.len() + 1);
        options.push(NodeOption {
            id: HUB_NODE_ID,
            label: "Hub (this site)".to_string(),
        });
        options.extend(nodes.iter().map(|node| NodeOption {
            id: node.id(),
            label: node.url().to_string(),
        }));
        Ok::<_, NodesApiError>(options)
    })
    .await
    .map_err(|e| NodesApiError::Join(e.to_string()))??;

    Ok(Json(options))
}

/// Handler for `GET /api/nodes`.
pub async fn list_nodes_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<NodeSummary>>, NodesApiError> {
    let nodes = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| NodesApiError::Pool(e.to_string()))?;
        let nodes = lattice_nodes::get_all_nodes(&conn)?;
        Ok::<_, NodesApiError>(nodes.iter().map(NodeSummary::from).collect::<Vec<_>>())
    })
    .await
    .map_err(|e| NodesApiError::Join(e.to_string()))??;

    Ok(Json(nodes))
}

/// Handler for `POST /api/nodes`.
pub async fn register_node_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<RegisterNodeRequest>,
) -> Result<Json<RegisteredNode>, NodesApiError> {
    let registered = tokio::task::spawn_blocking(move || {
        let mut conn = state.pool.get().map_err(|e| NodesApiError::Pool(e.to_string()))?;
        let node = lattice_nodes::create_node(&mut conn, &payload.url)?;

        record_admin_event(&state, &conn, "node_registered", node.url());

        Ok::<_, NodesApiError>(RegisteredNode {
            id: node.id(),
            url: node.url().to_string(),
            public_key: node.public_key().map(str::to_string),
            private_key: node.private_key().map(str::to_string),
            secret_key: node.secret_key().map(str::to_string),
        })
    })
    .await
    .map_err(|e| NodesApiError::Join(e.to_string()))??;

    Ok(Json(registered))
}

/// Handler for `PATCH /api/nodes/{nodeId}`.
pub async fn update_node_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(node_id): Path<i64>,
    Json(payload): Json<UpdateNodeRequest>,
) -> Result<Json<NodeSummary>, NodesApiError> {
    let summary = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| NodesApiError::Pool(e.to_string()))?;

        if let Some(ref url) = payload.url {
            lattice_nodes::update_node_url(&conn, node_id, url)?;
        }
        if let (Some(user), Some(pass)) = (payload.app_user.as_deref(), payload.app_pass.as_deref())
        {
            lattice_nodes::set_app_credentials(&conn, node_id, user, pass)?;
        }

        let node = lattice_nodes::get_node(&conn, node_id)?.ok_or(NodeError::NotFound(node_id))?;
        Ok::<_, NodesApiError>(NodeSummary::from(&node))
    })
    .await
    .map_err(|e| NodesApiError::Join(e.to_string()))??;

    Ok(Json(summary))
}

/// Handler for `POST /api/nodes/{nodeId}/rotate-keys`.
pub async fn rotate_keys_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(node_id): Path<i64>,
) -> Result<Json<RotatedKeys>, NodesApiError> {
    let rotated = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| NodesApiError::Pool(e.to_string()))?;
        let node = lattice_nodes::get_node(&conn, node_id)?.ok_or(NodeError::NotFound(node_id))?;
        let pair = lattice_nodes::rotate_key_pair(&conn, node_id)?;

        record_admin_event(&state, &conn, "node_key_rotated", node.url());

        Ok::<_, NodesApiError>(RotatedKeys {
            id: node_id,
            public_key: pair.public_key,
            private_key: pair.private_key,
        })
    })
    .await
    .map_err(|e| NodesApiError::Join(e.to_string()))??;

    Ok(Json(rotated))
}

/// Handler for `DELETE /api/nodes/{nodeId}`.
pub async fn delete_node_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(node_id): Path<i64>,
) -> Result<Json<DeletedNode>, NodesApiError> {
    let deleted = tokio::task::spawn_blocking(move || {
        let conn = state.pool.get().map_err(|e| NodesApiError::Pool(e.to_string()))?;
        let node = lattice_nodes::get_node(&conn, node_id)?.ok_or(NodeError::NotFound(node_id))?;
        let outcome = lattice_nodes::delete_node(&conn, node_id)?;

        record_admin_event(&state, &conn, "node_deleted", node.url());

        Ok::<_, NodesApiError>(DeletedNode {
            id: node_id,
            outcome: match outcome {
                DeleteOutcome::Tombstoned => "tombstoned",
                DeleteOutcome::HardDeleted => "deleted",
            },
        })
    })
    .await
    .map_err(|e| NodesApiError::Join(e.to_string()))??;

    Ok(Json(deleted))
}
