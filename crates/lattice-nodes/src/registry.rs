//! Registry operations over node records.
//!
//! All functions take a database connection directly, in keeping with
//! the rest of the workspace: the caller owns pooling and blocking
//! concerns. Creation is the deliberate trigger point for key material:
//! [`create_node`] runs [`ensure_key_pair`] and [`ensure_secret_key`]
//! explicitly rather than hiding generation inside a save hook.

use lattice_db::{create_record, delete_record, get_field, query_records, update_field};
use rusqlite::{Connection, TransactionBehavior};

use crate::error::NodeError;
use crate::node::Node;
use crate::{fields, NODE_RECORD_TYPE};

/// Outcome of a [`delete_node`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The node had no stored events and its record was removed.
    HardDeleted,
    /// Stored events still reference the node; it was tombstoned so the
    /// references stay resolvable.
    Tombstoned,
}

/// Strips trailing slashes from a URL.
///
/// Lookup and storage always operate on the normalized form, so
/// registering `https://a.example/` and resolving `https://a.example`
/// agree.
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Validates that `url` is a well-formed absolute http(s) URL and
/// returns its normalized form.
///
/// # Errors
///
/// Returns [`NodeError::InvalidUrl`] for anything else — malformed
/// input is rejected at the boundary, never stored.
pub fn validate_url(url: &str) -> Result<String, NodeError> {
    let normalized = normalize_url(url);
    let parsed =
        url::Url::parse(&normalized).map_err(|_| NodeError::InvalidUrl(url.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(NodeError::InvalidUrl(url.to_string()));
    }

    Ok(normalized)
}

/// Resolves a node by URL. The URL is normalized before lookup; the
/// match is exact and case-sensitive on the normalized form.
///
/// Returns `Ok(None)` for an unknown or tombstoned URL — an explicit
/// "absent" result.
pub fn get_node_by_url(conn: &Connection, url: &str) -> Result<Option<Node>, NodeError> {
    let normalized = normalize_url(url);
    let records = query_records(
        conn,
        NODE_RECORD_TYPE,
        Some((fields::URL, &normalized)),
        Some(1),
    )?;

    match records.first() {
        Some(record) => {
            let node = Node::from_record(record)?;
            Ok((!node.is_deleted()).then_some(node))
        }
        None => Ok(None),
    }
}

/// Loads a node by registry ID.
///
/// Returns `Ok(None)` if no record exists, and
/// [`NodeError::NotANode`] if the record exists but is not a node —
/// the caller always learns which of the two happened.
pub fn get_node(conn: &Connection, id: i64) -> Result<Option<Node>, NodeError> {
    match lattice_db::get_record(conn, id)? {
        Some(record) => Node::from_record(&record).map(Some),
        None => Ok(None),
    }
}

/// Lists all live (non-tombstoned) nodes, ordered by registry ID.
pub fn get_all_nodes(conn: &Connection) -> Result<Vec<Node>, NodeError> {
    let records = query_records(conn, NODE_RECORD_TYPE, None, None)?;
    let mut nodes = Vec::with_capacity(records.len());
    for record in &records {
        let node = Node::from_record(record)?;
        if !node.is_deleted() {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

/// Registers a new node at `url`.
///
/// Validates and normalizes the URL, rejects duplicates (including
/// tombstoned nodes — URLs are unique across the registry's lifetime),
/// creates the record, then explicitly provisions the Ed25519 key pair
/// and the one-time secret key.
///
/// The whole sequence runs in one immediate transaction: two writers
/// racing on the same URL are serialized, and a failed provisioning
/// step cannot leave behind a keyless record reserving the URL. A
/// unique index on the URL field backstops the duplicate check at the
/// schema level.
pub fn create_node(conn: &mut Connection, url: &str) -> Result<Node, NodeError> {
    let normalized = validate_url(url)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing = query_records(
        &tx,
        NODE_RECORD_TYPE,
        Some((fields::URL, &normalized)),
        Some(1),
    )?;
    if !existing.is_empty() {
        return Err(NodeError::DuplicateUrl(normalized));
    }

    let id = create_record(&tx, NODE_RECORD_TYPE, &[(fields::URL, normalized.as_str())])
        .map_err(|e| map_url_conflict(e.into(), &normalized))?;

    ensure_key_pair(&tx, id)?;
    ensure_secret_key(&tx, id)?;

    let node = get_node(&tx, id)?.ok_or(NodeError::NotFound(id))?;
    tx.commit()?;

    tracing::info!(node_id = id, url = %normalized, "registered node");
    Ok(node)
}

/// Rewrites a URL-field constraint violation as the duplicate-URL
/// error the caller actually cares about.
fn map_url_conflict(err: NodeError, url: &str) -> NodeError {
    let is_constraint = |e: &rusqlite::Error| {
        matches!(
            e,
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation
        )
    };

    match &err {
        NodeError::Record(lattice_db::RecordError::Database(e)) if is_constraint(e) => {
            NodeError::DuplicateUrl(url.to_string())
        }
        NodeError::Database(e) if is_constraint(e) => NodeError::DuplicateUrl(url.to_string()),
        _ => err,
    }
}

/// Generates and stores the node's secret key if none is present.
///
/// Check-then-set: an existing key is never overwritten, so calling
/// this from every update path is safe. Returns `true` if a key was
/// generated on this call.
pub fn ensure_secret_key(conn: &Connection, node_id: i64) -> Result<bool, NodeError> {
    match get_field(conn, node_id, fields::SECRET_KEY)? {
        Some(key) if !key.is_empty() => Ok(false),
        _ => {
            let secret_key = lattice_crypto::generate_secret_key()?;
            update_field(conn, node_id, fields::SECRET_KEY, &secret_key)?;
            tracing::info!(node_id, "generated node secret key");
            Ok(true)
        }
    }
}

/// Generates and stores an Ed25519 key pair if the node has none.
/// Returns `true` if a pair was generated on this call.
pub fn ensure_key_pair(conn: &Connection, node_id: i64) -> Result<bool, NodeError> {
    match get_field(conn, node_id, fields::PUBLIC_KEY)? {
        Some(key) if !key.is_empty() => Ok(false),
        _ => {
            let pair = lattice_crypto::generate_key_pair()?;
            update_field(conn, node_id, fields::PRIVATE_KEY, &pair.private_key)?;
            update_field(conn, node_id, fields::PUBLIC_KEY, &pair.public_key)?;
            tracing::info!(node_id, "generated node key pair");
            Ok(true)
        }
    }
}

/// Replaces the node's Ed25519 key pair unconditionally and returns the
/// new pair so the private half can be reissued to the node.
pub fn rotate_key_pair(
    conn: &Connection,
    node_id: i64,
) -> Result<lattice_crypto::KeyPair, NodeError> {
    require_node(conn, node_id)?;

    let pair = lattice_crypto::generate_key_pair()?;
    update_field(conn, node_id, fields::PRIVATE_KEY, &pair.private_key)?;
    update_field(conn, node_id, fields::PUBLIC_KEY, &pair.public_key)?;
    tracing::info!(node_id, "rotated node key pair");
    Ok(pair)
}

/// Changes a node's canonical URL. The new URL is validated, normalized
/// and checked for uniqueness against every other node record.
pub fn update_node_url(conn: &Connection, node_id: i64, url: &str) -> Result<Node, NodeError> {
    require_node(conn, node_id)?;
    let normalized = validate_url(url)?;

    let existing = query_records(
        conn,
        NODE_RECORD_TYPE,
        Some((fields::URL, &normalized)),
        Some(1),
    )?;
    if existing.iter().any(|record| record.id != node_id) {
        return Err(NodeError::DuplicateUrl(normalized));
    }

    // The unique URL index catches a writer that slipped in between the
    // check above and this write.
    update_field(conn, node_id, fields::URL, &normalized)
        .map_err(|e| map_url_conflict(e.into(), &normalized))?;
    get_node(conn, node_id)?.ok_or(NodeError::NotFound(node_id))
}

/// Stores the application credential pair used for hub-initiated calls
/// to this node.
pub fn set_app_credentials(
    conn: &Connection,
    node_id: i64,
    app_user: &str,
    app_pass: &str,
) -> Result<(), NodeError> {
    require_node(conn, node_id)?;
    update_field(conn, node_id, fields::APP_USER, app_user)?;
    update_field(conn, node_id, fields::APP_PASS, app_pass)?;
    Ok(())
}

/// Removes a node from the registry.
///
/// If stored events still reference the node it is tombstoned instead
/// of removed, so historical event queries keep resolving; otherwise
/// the record is deleted outright.
pub fn delete_node(conn: &Connection, node_id: i64) -> Result<DeleteOutcome, NodeError> {
    require_node(conn, node_id)?;

    let referenced: i64 = conn.query_row(
        "SELECT COUNT(*) FROM event_log WHERE node_id = ?1",
        [node_id],
        |row| row.get(0),
    )?;

    if referenced > 0 {
        update_field(conn, node_id, fields::DELETED, "1")?;
        tracing::info!(node_id, referenced, "tombstoned node with stored events");
        Ok(DeleteOutcome::Tombstoned)
    } else {
        delete_record(conn, node_id)?;
        tracing::info!(node_id, "hard-deleted node");
        Ok(DeleteOutcome::HardDeleted)
    }
}

fn require_node(conn: &Connection, node_id: i64) -> Result<Node, NodeError> {
    get_node(conn, node_id)?.ok_or(NodeError::NotFound(node_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        lattice_db::run_migrations(&conn).expect("migrations should succeed");
        conn
    }

    #[test]
    fn create_then_resolve_by_url_normalizes() {
        let mut conn = test_db();

        let created = create_node(&mut conn, "https://a.example/").expect("create should succeed");
        assert_eq!(created.url(), "https://a.example");

        // Resolving with or without the trailing slash finds the same node.
        let resolved = get_node_by_url(&conn, "https://a.example/")
            .expect("lookup should succeed")
            .expect("node should resolve");
        assert_eq!(resolved.id(), created.id());
        assert_eq!(resolved.url(), "https://a.example");

        let absent = get_node_by_url(&conn, "https://unknown.example").unwrap();
        assert!(absent.is_none(), "unknown URL is an explicit absent result");
    }

    #[test]
    fn create_provisions_keys() {
        let mut conn = test_db();
        let node = create_node(&mut conn, "https://a.example").unwrap();

        assert!(node.public_key().is_some(), "key pair generated at creation");
        assert!(node.private_key().is_some());
        assert!(node.secret_key().is_some(), "secret key generated at creation");
    }

    #[test]
    fn ensure_secret_key_never_overwrites() {
        let mut conn = test_db();
        let node = create_node(&mut conn, "https://a.example").unwrap();
        let original = node.secret_key().unwrap().to_string();

        let generated = ensure_secret_key(&conn, node.id()).unwrap();
        assert!(!generated, "second call should not regenerate");

        let after = get_node(&conn, node.id()).unwrap().unwrap();
        assert_eq!(after.secret_key().unwrap(), original);
    }

    #[test]
    fn rotate_key_pair_replaces_keys() {
        let mut conn = test_db();
        let node = create_node(&mut conn, "https://a.example").unwrap();
        let old_public = node.public_key().unwrap().to_string();

        let pair = rotate_key_pair(&conn, node.id()).unwrap();
        assert_ne!(pair.public_key, old_public);

        let after = get_node(&conn, node.id()).unwrap().unwrap();
        assert_eq!(after.public_key().unwrap(), pair.public_key);
    }

    #[test]
    fn malformed_and_duplicate_urls_are_rejected() {
        let mut conn = test_db();
        create_node(&mut conn, "https://a.example").unwrap();

        for bad in ["not a url", "ftp://a.example", "a.example", ""] {
            let err = create_node(&mut conn, bad).expect_err("should reject");
            assert!(matches!(err, NodeError::InvalidUrl(_)), "{bad}: {err:?}");
        }

        let err = create_node(&mut conn, "https://a.example/").expect_err("should reject dup");
        assert!(matches!(err, NodeError::DuplicateUrl(_)));
    }

    #[test]
    fn update_node_url_enforces_uniqueness() {
        let mut conn = test_db();
        let a = create_node(&mut conn, "https://a.example").unwrap();
        let b = create_node(&mut conn, "https://b.example").unwrap();

        let err = update_node_url(&conn, b.id(), "https://a.example").expect_err("should reject");
        assert!(matches!(err, NodeError::DuplicateUrl(_)));

        // Re-saving a node's own URL is fine.
        let same = update_node_url(&conn, a.id(), "https://a.example/").unwrap();
        assert_eq!(same.url(), "https://a.example");

        let moved = update_node_url(&conn, b.id(), "https://c.example/").unwrap();
        assert_eq!(moved.url(), "https://c.example");
    }

    #[test]
    fn get_node_distinguishes_absent_from_not_a_node() {
        let conn = test_db();
        assert!(get_node(&conn, 99).unwrap().is_none());

        let widget =
            lattice_db::create_record(&conn, "widget", &[("label", "not a node")]).unwrap();
        let err = get_node(&conn, widget).expect_err("wrong record type should fail");
        assert!(matches!(err, NodeError::NotANode(id) if id == widget));
    }

    #[test]
    fn delete_without_events_removes_record() {
        let mut conn = test_db();
        let node = create_node(&mut conn, "https://a.example").unwrap();

        let outcome = delete_node(&conn, node.id()).unwrap();
        assert_eq!(outcome, DeleteOutcome::HardDeleted);
        assert!(get_node(&conn, node.id()).unwrap().is_none());
    }

    #[test]
    fn delete_with_events_tombstones() {
        let mut conn = test_db();
        let node = create_node(&mut conn, "https://a.example").unwrap();

        conn.execute(
            "INSERT INTO event_log (node_id, action_name, summary, data, timestamp)
             VALUES (?1, 'post_published', 'a post', '{}', 1700000000)",
            params![node.id()],
        )
        .unwrap();

        let outcome = delete_node(&conn, node.id()).unwrap();
        assert_eq!(outcome, DeleteOutcome::Tombstoned);

        // The record still resolves by ID (for event display)...
        let tombstoned = get_node(&conn, node.id()).unwrap().unwrap();
        assert!(tombstoned.is_deleted());

        // ...but is gone from lookups and listings.
        assert!(get_node_by_url(&conn, "https://a.example").unwrap().is_none());
        assert!(get_all_nodes(&conn).unwrap().is_empty());

        // Its URL stays reserved.
        let err = create_node(&mut conn, "https://a.example").expect_err("should stay reserved");
        assert!(matches!(err, NodeError::DuplicateUrl(_)));
    }

    #[test]
    fn duplicate_url_write_hits_schema_constraint() {
        let mut conn = test_db();
        let a = create_node(&mut conn, "https://a.example").unwrap();
        let b = create_node(&mut conn, "https://b.example").unwrap();

        // Write b's URL field directly, bypassing the registry's own
        // duplicate check: the unique index must still refuse it.
        let err = lattice_db::update_field(&conn, b.id(), crate::fields::URL, a.url())
            .expect_err("schema must reject the duplicate URL");
        assert!(matches!(
            err,
            lattice_db::RecordError::Database(rusqlite::Error::SqliteFailure(f, _))
                if f.code == rusqlite::ErrorCode::ConstraintViolation
        ));
    }

    #[test]
    fn concurrent_registrations_of_same_url_yield_one_node() {
        use std::sync::{Arc, Barrier};

        let db_file = tempfile::NamedTempFile::new().expect("should create temp db");
        let db_path = db_file.path().to_str().expect("temp path should be utf-8");

        let pool = lattice_db::create_pool(db_path, lattice_db::DbRuntimeSettings::default())
            .expect("should create pool");
        {
            let conn = pool.get().expect("should get connection");
            lattice_db::run_migrations(&conn).expect("migrations should succeed");
        }

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let pool = pool.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let mut conn = pool.get().expect("writer should get connection");
                    barrier.wait();
                    create_node(&mut conn, "https://race.example")
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("writer thread should not panic"))
            .collect();

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one registration may win: {results:?}");
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(NodeError::DuplicateUrl(_)))),
            "the loser must see a duplicate URL: {results:?}"
        );

        let conn = pool.get().unwrap();
        let records: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM record_fields
                 WHERE field_key = 'node-url' AND field_value = 'https://race.example'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(records, 1, "only one record may hold the URL");

        // The winner is fully provisioned.
        let node = get_node_by_url(&conn, "https://race.example")
            .unwrap()
            .expect("winning node should resolve");
        assert!(node.public_key().is_some());
        assert!(node.secret_key().is_some());
    }

    #[test]
    fn signed_message_round_trip_through_node() {
        let mut conn = test_db();
        let node = create_node(&mut conn, "https://a.example").unwrap();

        let message = br#"{"action_name":"post_published","timestamp":1700000000,"data":{}}"#;
        let signature =
            lattice_crypto::sign_message(message, node.private_key().unwrap()).unwrap();

        node.verify_signed_message(message, &signature)
            .expect("verification should succeed");

        let err = node
            .verify_signed_message(b"tampered", &signature)
            .expect_err("tampered message must fail");
        assert!(matches!(err, NodeError::Verification { .. }));
    }

    #[test]
    fn authorization_header_requires_both_credentials() {
        let mut conn = test_db();
        let node = create_node(&mut conn, "https://a.example").unwrap();

        let err = node.authorization_header().expect_err("no creds yet");
        assert!(matches!(err, NodeError::MissingCredentials(_)));

        set_app_credentials(&conn, node.id(), "hub", "s3cret").unwrap();
        let node = get_node(&conn, node.id()).unwrap().unwrap();
        assert_eq!(node.authorization_header().unwrap(), "Basic aHViOnMzY3JldA==");
    }
}
