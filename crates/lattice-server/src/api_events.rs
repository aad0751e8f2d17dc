//! Admin query surface over the event log.
//!
//! Read-only. The filter/pagination contract lives here: `search`,
//! `action_name`, `node_id` (0 selects hub-local events), `page`,
//! `per_page`, with total counts for `ceil(count / per_page)` paging.

use crate::AppState;
use axum::{
    extract::{Extension, Query},
    Json,
};
use lattice_eventlog::{
    count_events, query_events, total_pages, EventFilter, EventLogError, HUB_NODE_ID,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the event query endpoints.
#[derive(Debug, Error)]
pub enum EventsApiError {
    #[error("database pool error: {0}")]
    Pool(String),
    #[error("event log error: {0}")]
    EventLog(#[from] EventLogError),
    #[error("node registry error: {0}")]
    Registry(#[from] lattice_nodes::NodeError),
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl axum::response::IntoResponse for EventsApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            EventsApiError::EventLog(EventLogError::InvalidPagination { .. }) => {
                StatusCode::BAD_REQUEST
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

/// Query parameters for `GET /api/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Free-text search against summary and raw payload.
    pub search: Option<String>,
    /// Exact event type match.
    pub action_name: Option<String>,
    /// Exact node match; `0` selects hub-local events.
    pub node_id: Option<i64>,
    /// 1-indexed page number (default 1).
    pub page: Option<u32>,
    /// Page length (default 10, capped at 100).
    pub per_page: Option<u32>,
}

/// One event prepared for display.
#[derive(Debug, Serialize)]
pub struct EventListItem {
    pub id: i64,
    pub timestamp: i64,
    pub date: String,
    pub summary: String,
    pub node_id: i64,
    pub node_url: String,
    pub action_name: String,
    pub action_label: String,
    pub data: String,
}

/// Response body for `GET /api/events`.
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub items: Vec<EventListItem>,
    pub total_items: i64,
    pub total_pages: i64,
    pub page: u32,
    pub per_page: u32,
}

/// Handler for `GET /api/events`.
///
/// Pages past the last one return an empty `items` with the full
/// `total_items`, never an error.
pub async fn list_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, EventsApiError> {
    let page = params.page.unwrap_or(1);
    let per_page = params.per_page.unwrap_or(10).min(100);

    let filter = EventFilter {
        search: params.search,
        action_name: params.action_name,
        node_id: params.node_id,
    };

    let response = tokio::task::spawn_blocking(move || {
        let conn = state
            .pool
            .get()
            .map_err(|e| EventsApiError::Pool(e.to_string()))?;

        let total_items = count_events(&conn, &filter)?;
        let events = query_events(&conn, &filter, per_page, page)?;

        // Resolve node display labels once per distinct node id. A node
        // that no longer resolves degrades to a placeholder; a
        // tombstoned one keeps its URL, marked as deleted.
        let mut labels: HashMap<i64, String> = HashMap::new();
        let mut items = Vec::with_capacity(events.len());
        for event in events {
            let node_url = match labels.entry(event.node_id) {
                std::collections::hash_map::Entry::Occupied(entry) => entry.get().clone(),
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let label = node_display_label(&conn, event.node_id)?;
                    entry.insert(label).clone()
                }
            };

            let date = chrono::DateTime::from_timestamp(event.timestamp, 0)
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default();

            items.push(EventListItem {
                id: event.id,
                timestamp: event.timestamp,
                date,
                summary: event.summary,
                node_id: event.node_id,
                node_url,
                action_label: state.catalogue.display_label(&event.action_name).to_string(),
                action_name: event.action_name,
                data: event.data,
            });
        }

        Ok::<_, EventsApiError>(EventsResponse {
            items,
            total_items,
            total_pages: total_pages(total_items, per_page),
            page,
            per_page,
        })
    })
    .await
    .map_err(|e| EventsApiError::Join(e.to_string()))??;

    Ok(Json(response))
}

fn node_display_label(
    conn: &rusqlite::Connection,
    node_id: i64,
) -> Result<String, EventsApiError> {
    if node_id == HUB_NODE_ID {
        return Ok("Hub (this site)".to_string());
    }
    match lattice_nodes::get_node(conn, node_id) {
        Ok(Some(node)) if node.is_deleted() => Ok(format!("{} (deleted)", node.url())),
        Ok(Some(node)) => Ok(node.url().to_string()),
        // Hard-deleted or never-a-node references still render.
        Ok(None) | Err(lattice_nodes::NodeError::NotANode(_)) => Ok("(deleted node)".to_string()),
        Err(e) => Err(e.into()),
    }
}

/// Handler for `GET /api/event-types`.
///
/// Returns the registered `action_name → label` mapping for filter-UI
/// population.
pub async fn list_event_types_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<BTreeMap<String, String>> {
    Json(state.catalogue.labels())
}
