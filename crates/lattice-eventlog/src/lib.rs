//! Append-only event log for the Lattice hub.
//!
//! Every verified occurrence reported by a node — and every
//! administrative action the hub takes itself — lands in one immutable,
//! filterable log. Rows are never updated or deleted after insertion;
//! the id sequence is strictly increasing under concurrent writers.
//!
//! Event types are registered up front in an [`EventTypeCatalogue`]:
//! each feature module contributes its `action_name → descriptor`
//! entries during startup, the catalogue is built once, and it is
//! read-only from then on. Appending an event whose `action_name` is
//! not catalogued is rejected, and the human-readable `summary` is
//! computed exactly once, at ingestion, by the catalogued formatter.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lattice_eventlog::{append_event, CatalogueBuilder, NewEvent};
//!
//! let mut builder = CatalogueBuilder::new();
//! builder.register("post_published", "Post published", |data| {
//!     format!("Post published: {}", data["title"].as_str().unwrap_or("?"))
//! })?;
//! let catalogue = builder.build();
//!
//! append_event(&conn, &catalogue, &NewEvent::new(node_id, "post_published", payload))?;
//! ```

mod catalogue;
mod error;
mod item;
mod store;

pub use catalogue::{CatalogueBuilder, CatalogueError, EventTypeCatalogue, EventTypeDescriptor,
    SummaryFormatter};
pub use error::EventLogError;
pub use item::{EventLogItem, NewEvent, HUB_NODE_ID};
pub use store::{append_event, count_events, query_events, total_pages, EventFilter};

#[cfg(test)]
mod tests;
