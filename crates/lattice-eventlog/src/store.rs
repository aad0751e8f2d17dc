//! Persistence operations for the event log.
//!
//! All writes go through [`append_event`], which validates the event
//! type against the catalogue, renders the summary, and inserts in a
//! single statement. The `id` comes from SQLite's `AUTOINCREMENT`
//! sequence, which assigns strictly increasing, never-reused values
//! atomically — concurrent writers can neither duplicate nor lose an
//! id. Gaps can only appear when an insert's transaction rolls back.
//!
//! Reads go through [`query_events`] / [`count_events`], which support
//! free-text search plus exact `action_name` and `node_id` filters with
//! 1-indexed page/page-size pagination, newest first.

use rusqlite::{params, Connection};

use crate::catalogue::EventTypeCatalogue;
use crate::error::EventLogError;
use crate::item::{EventLogItem, NewEvent};

/// Appends a single event to the log.
///
/// The `action_name` must be registered in the catalogue; the summary
/// is computed here, once, by the catalogued formatter. The row is
/// written atomically — a partially written event is never observable.
///
/// # Errors
///
/// Returns [`EventLogError::UnregisteredEventType`] for an uncatalogued
/// type, `Serialization` if the payload cannot be serialized, and
/// `Database` on SQL failure.
pub fn append_event(
    conn: &Connection,
    catalogue: &EventTypeCatalogue,
    event: &NewEvent,
) -> Result<EventLogItem, EventLogError> {
    let descriptor = catalogue
        .resolve(&event.action_name)
        .ok_or_else(|| EventLogError::UnregisteredEventType(event.action_name.clone()))?;

    let data_json = serde_json::to_string(&event.data)?;
    let summary = descriptor.summarize(&event.data);

    let (id, created_at) = conn.query_row(
        "INSERT INTO event_log (node_id, action_name, summary, data, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)
         RETURNING id, created_at",
        params![
            event.node_id,
            event.action_name,
            summary,
            data_json,
            event.timestamp,
        ],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )?;

    tracing::debug!(
        event_id = id,
        node_id = event.node_id,
        action_name = %event.action_name,
        "appended event"
    );

    Ok(EventLogItem {
        id,
        node_id: event.node_id,
        action_name: event.action_name.clone(),
        summary,
        data: data_json,
        timestamp: event.timestamp,
        created_at,
    })
}

/// Filter criteria for querying the event log.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Free-text match against the summary and the raw payload.
    pub search: Option<String>,
    /// Exact match on the event type identifier.
    pub action_name: Option<String>,
    /// Exact match on the originating node id (`0` = hub-local).
    pub node_id: Option<i64>,
}

/// Queries the event log, newest first.
///
/// Pagination is 1-indexed: `page_number = 1` returns the most recent
/// `page_size` items. Pages past the end yield an empty vec, never an
/// error.
///
/// # Errors
///
/// Returns [`EventLogError::InvalidPagination`] if `page_size` or
/// `page_number` is zero, and `Database` on SQL failure.
pub fn query_events(
    conn: &Connection,
    filter: &EventFilter,
    page_size: u32,
    page_number: u32,
) -> Result<Vec<EventLogItem>, EventLogError> {
    if page_size == 0 || page_number == 0 {
        return Err(EventLogError::InvalidPagination {
            page_size,
            page_number,
        });
    }

    let (where_clause, mut param_values, idx) = build_filter(filter);

    let sql = format!(
        "SELECT id, node_id, action_name, summary, data, timestamp, created_at
         FROM event_log
         {where_clause}
         ORDER BY id DESC
         LIMIT ?{idx} OFFSET ?{next}",
        next = idx + 1
    );
    let offset = i64::from(page_size) * (i64::from(page_number) - 1);
    param_values.push(Box::new(i64::from(page_size)));
    param_values.push(Box::new(offset));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| &**p).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_refs.as_slice(), |row| {
        Ok(EventLogItem {
            id: row.get(0)?,
            node_id: row.get(1)?,
            action_name: row.get(2)?,
            summary: row.get(3)?,
            data: row.get(4)?,
            timestamp: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

/// Counts all events matching the filter, irrespective of pagination.
pub fn count_events(conn: &Connection, filter: &EventFilter) -> Result<i64, EventLogError> {
    let (where_clause, param_values, _) = build_filter(filter);

    let sql = format!("SELECT COUNT(*) FROM event_log {where_clause}");
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| &**p).collect();

    let count = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
    Ok(count)
}

/// Total page count for a result set: `ceil(total_items / page_size)`.
pub fn total_pages(total_items: i64, page_size: u32) -> i64 {
    if page_size == 0 {
        return 0;
    }
    (total_items + i64::from(page_size) - 1) / i64::from(page_size)
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Builds the WHERE clause and bind parameters for a filter. Clauses
/// and parameters are collected separately so nothing is interpolated.
fn build_filter(
    filter: &EventFilter,
) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>, u32) {
    let mut clauses: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut idx = 1u32;

    if let Some(ref search) = filter.search {
        // LIKE metacharacters in the search term match literally.
        let pattern = format!("%{}%", escape_like(search));
        clauses.push(format!(
            "(summary LIKE ?{idx} ESCAPE '\\' OR data LIKE ?{next} ESCAPE '\\')",
            next = idx + 1
        ));
        param_values.push(Box::new(pattern.clone()));
        param_values.push(Box::new(pattern));
        idx += 2;
    }

    if let Some(ref action_name) = filter.action_name {
        clauses.push(format!("action_name = ?{idx}"));
        param_values.push(Box::new(action_name.clone()));
        idx += 1;
    }

    if let Some(node_id) = filter.node_id {
        clauses.push(format!("node_id = ?{idx}"));
        param_values.push(Box::new(node_id));
        idx += 1;
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    (where_clause, param_values, idx)
}
