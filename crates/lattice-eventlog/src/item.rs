//! Event record types.

use serde::{Deserialize, Serialize};

/// Sentinel `node_id` for events produced by the hub itself.
pub const HUB_NODE_ID: i64 = 0;

/// One row of the append-only event log. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogItem {
    /// Monotonic, globally unique id assigned at persistence time.
    pub id: i64,
    /// Owning node's registry id, or [`HUB_NODE_ID`] for hub-local events.
    pub node_id: i64,
    /// Event type identifier, registered in the catalogue at ingestion.
    pub action_name: String,
    /// Human-readable summary, computed once at ingestion.
    pub summary: String,
    /// The raw structured payload, serialized verbatim for audit.
    pub data: String,
    /// Event occurrence time, UTC epoch seconds.
    pub timestamp: i64,
    /// ISO 8601 timestamp of when the row was written.
    pub created_at: String,
}

/// An event submitted for ingestion, before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// Originating node id, or [`HUB_NODE_ID`].
    pub node_id: i64,
    /// Catalogued event type identifier.
    pub action_name: String,
    /// Occurrence time, UTC epoch seconds.
    pub timestamp: i64,
    /// Structured payload, preserved verbatim.
    pub data: serde_json::Value,
}

impl NewEvent {
    /// Creates an event stamped with the current time.
    pub fn new(node_id: i64, action_name: impl Into<String>, data: serde_json::Value) -> Self {
        Self::at(node_id, action_name, chrono::Utc::now().timestamp(), data)
    }

    /// Creates an event with an explicit occurrence time.
    pub fn at(
        node_id: i64,
        action_name: impl Into<String>,
        timestamp: i64,
        data: serde_json::Value,
    ) -> Self {
        Self {
            node_id,
            action_name: action_name.into(),
            timestamp,
            data,
        }
    }
}
