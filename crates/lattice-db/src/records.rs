//! Generic record store.
//!
//! A record is a typed row in `records` plus an open set of string
//! fields in `record_fields`. The node registry stores its identity
//! records here; the field names (`node-url`, `private-key`, ...) are a
//! contract other crates depend on, so fields are kept as opaque
//! key/value strings rather than dedicated columns.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A database operation failed.
    #[error("record store database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// One record with its fields fully loaded.
#[derive(Debug, Clone)]
pub struct Record {
    /// Auto-incremented record ID.
    pub id: i64,
    /// The record type tag (e.g. `node`).
    pub record_type: String,
    /// All string fields attached to this record.
    pub fields: HashMap<String, String>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
}

impl Record {
    /// Returns the value of a field, if present.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Creates a new record of the given type with an initial set of fields.
///
/// The record row and its fields are written atomically: a failure
/// partway through leaves no partial record behind. Uses a savepoint so
/// callers may run this inside their own enclosing transaction.
pub fn create_record(
    conn: &Connection,
    record_type: &str,
    fields: &[(&str, &str)],
) -> Result<i64, RecordError> {
    conn.execute_batch("SAVEPOINT record_insert")?;

    match insert_record(conn, record_type, fields) {
        Ok(id) => {
            conn.execute_batch("RELEASE record_insert")?;
            Ok(id)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK TO record_insert; RELEASE record_insert");
            Err(e)
        }
    }
}

fn insert_record(
    conn: &Connection,
    record_type: &str,
    fields: &[(&str, &str)],
) -> Result<i64, RecordError> {
    conn.execute(
        "INSERT INTO records (record_type) VALUES (?1)",
        params![record_type],
    )?;
    let id = conn.last_insert_rowid();

    for (key, value) in fields {
        conn.execute(
            "INSERT INTO record_fields (record_id, field_key, field_value) VALUES (?1, ?2, ?3)",
            params![id, key, value],
        )?;
    }

    Ok(id)
}

/// Loads a record and all of its fields by ID.
///
/// Returns `Ok(None)` if no record with that ID exists — an explicit
/// "absent" result, distinct from a database failure.
pub fn get_record(conn: &Connection, id: i64) -> Result<Option<Record>, RecordError> {
    let head: Option<(String, String)> = conn
        .query_row(
            "SELECT record_type, created_at FROM records WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((record_type, created_at)) = head else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT field_key, field_value FROM record_fields WHERE record_id = ?1")?;
    let rows = stmt.query_map(params![id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut fields = HashMap::new();
    for row in rows {
        let (key, value) = row?;
        fields.insert(key, value);
    }

    Ok(Some(Record {
        id,
        record_type,
        fields,
        created_at,
    }))
}

/// Queries records of a type, optionally requiring an exact field match.
///
/// Results are ordered by record ID (insertion order), which is stable
/// within a call. `limit` bounds the number of records returned.
pub fn query_records(
    conn: &Connection,
    record_type: &str,
    field_filter: Option<(&str, &str)>,
    limit: Option<i64>,
) -> Result<Vec<Record>, RecordError> {
    let ids: Vec<i64> = match field_filter {
        Some((key, value)) => {
            let mut stmt = conn.prepare(
                "SELECT r.id FROM records r
                 JOIN record_fields f ON f.record_id = r.id
                 WHERE r.record_type = ?1 AND f.field_key = ?2 AND f.field_value = ?3
                 ORDER BY r.id ASC
                 LIMIT ?4",
            )?;
            let rows = stmt.query_map(
                params![record_type, key, value, limit.unwrap_or(-1)],
                |row| row.get(0),
            )?;
            rows.collect::<Result<_, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id FROM records WHERE record_type = ?1 ORDER BY id ASC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![record_type, limit.unwrap_or(-1)], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        }
    };

    let mut result = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(record) = get_record(conn, id)? {
            result.push(record);
        }
    }
    Ok(result)
}

/// Returns the value of a single field, if present.
pub fn get_field(conn: &Connection, record_id: i64, key: &str) -> Result<Option<String>, RecordError> {
    let value = conn
        .query_row(
            "SELECT field_value FROM record_fields WHERE record_id = ?1 AND field_key = ?2",
            params![record_id, key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Sets a field on a record, inserting or overwriting as needed.
pub fn update_field(
    conn: &Connection,
    record_id: i64,
    key: &str,
    value: &str,
) -> Result<(), RecordError> {
    conn.execute(
        "INSERT INTO record_fields (record_id, field_key, field_value) VALUES (?1, ?2, ?3)
         ON CONFLICT(record_id, field_key) DO UPDATE SET field_value = excluded.field_value",
        params![record_id, key, value],
    )?;
    conn.execute(
        "UPDATE records SET updated_at = datetime('now') WHERE id = ?1",
        params![record_id],
    )?;
    Ok(())
}

/// Deletes a record and its fields. Returns `true` if a record was removed.
pub fn delete_record(conn: &Connection, id: i64) -> Result<bool, RecordError> {
    let removed = conn.execute("DELETE FROM records WHERE id = ?1", params![id])?;
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_migrations;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");
        conn
    }

    #[test]
    fn create_and_get_record_round_trips_fields() {
        let conn = test_db();

        let id = create_record(
            &conn,
            "node",
            &[("node-url", "https://a.example"), ("secret-key", "s3cret")],
        )
        .expect("create should succeed");

        let record = get_record(&conn, id)
            .expect("get should succeed")
            .expect("record should exist");

        assert_eq!(record.record_type, "node");
        assert_eq!(record.field("node-url"), Some("https://a.example"));
        assert_eq!(record.field("secret-key"), Some("s3cret"));
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn get_record_absent_is_none() {
        let conn = test_db();
        let record = get_record(&conn, 42).expect("get should succeed");
        assert!(record.is_none());
    }

    #[test]
    fn query_records_filters_by_type_and_field() {
        let conn = test_db();

        let a = create_record(&conn, "node", &[("node-url", "https://a.example")]).unwrap();
        let _b = create_record(&conn, "node", &[("node-url", "https://b.example")]).unwrap();
        // Same field key on a different record type must not match a
        // "node" query.
        let _other = create_record(&conn, "widget", &[("owner-url", "https://a.example")]).unwrap();

        let all = query_records(&conn, "node", None, None).expect("query should succeed");
        assert_eq!(all.len(), 2);

        let matched = query_records(&conn, "node", Some(("node-url", "https://a.example")), None)
            .expect("query should succeed");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, a);
    }

    #[test]
    fn update_field_overwrites_existing_value() {
        let conn = test_db();
        let id = create_record(&conn, "node", &[("node-url", "https://a.example")]).unwrap();

        update_field(&conn, id, "node-url", "https://renamed.example").unwrap();
        update_field(&conn, id, "app-user", "hub").unwrap();

        assert_eq!(
            get_field(&conn, id, "node-url").unwrap().as_deref(),
            Some("https://renamed.example")
        );
        assert_eq!(get_field(&conn, id, "app-user").unwrap().as_deref(), Some("hub"));
    }

    #[test]
    fn failed_create_leaves_no_partial_record() {
        let conn = test_db();

        // The repeated field key violates the (record_id, field_key)
        // primary key partway through the field inserts.
        let result = create_record(
            &conn,
            "node",
            &[
                ("node-url", "https://a.example"),
                ("node-url", "https://b.example"),
            ],
        );
        assert!(result.is_err());

        let records: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(records, 0, "the record row must be rolled back too");
    }

    #[test]
    fn delete_record_cascades_fields() {
        let conn = test_db();
        let id = create_record(&conn, "node", &[("node-url", "https://a.example")]).unwrap();

        assert!(delete_record(&conn, id).unwrap());
        assert!(get_record(&conn, id).unwrap().is_none());

        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM record_fields WHERE record_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0, "fields should be deleted with the record");

        assert!(!delete_record(&conn, id).unwrap(), "second delete is a no-op");
    }
}
