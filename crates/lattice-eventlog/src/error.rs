//! Error types for the event log.

use thiserror::Error;

/// Errors that can occur during event log operations.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// A database operation failed.
    #[error("event log database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization of the raw payload failed.
    #[error("event log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The event's `action_name` is not in the catalogue. Rejected at
    /// ingestion rather than silently stored.
    #[error("event type '{0}' is not registered in the catalogue")]
    UnregisteredEventType(String),

    /// Pagination parameters are zero. Pages are 1-indexed and a page
    /// must hold at least one item.
    #[error("invalid pagination: page_size={page_size}, page_number={page_number}")]
    InvalidPagination {
        /// Requested page size.
        page_size: u32,
        /// Requested page number.
        page_number: u32,
    },
}
