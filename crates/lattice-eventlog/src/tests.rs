//! Unit tests for the event log store and its query contract.

use rusqlite::Connection;
use serde_json::json;

use crate::catalogue::{CatalogueBuilder, EventTypeCatalogue};
use crate::error::EventLogError;
use crate::item::{NewEvent, HUB_NODE_ID};
use crate::store::{append_event, count_events, query_events, total_pages, EventFilter};

/// Creates an in-memory SQLite database with migrations applied.
fn test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("should open in-memory db");
    lattice_db::run_migrations(&conn).expect("migrations should succeed");
    conn
}

fn test_catalogue() -> EventTypeCatalogue {
    let mut builder = CatalogueBuilder::new();
    builder
        .register("post_published", "Post published", |data| {
            format!(
                "Post published: {}",
                data["title"].as_str().unwrap_or("untitled")
            )
        })
        .unwrap();
    builder
        .register("reader_registered", "Reader registered", |data| {
            format!("New reader: {}", data["email"].as_str().unwrap_or("?"))
        })
        .unwrap();
    builder.build()
}

// ── append_event ─────────────────────────────────────────────────────

#[test]
fn append_event_inserts_row_with_summary() {
    let conn = test_db();
    let catalogue = test_catalogue();

    let event = NewEvent::at(3, "post_published", 1_700_000_000, json!({"title": "Hello"}));
    let item = append_event(&conn, &catalogue, &event).expect("append should succeed");

    assert!(item.id > 0);
    assert_eq!(item.node_id, 3);
    assert_eq!(item.summary, "Post published: Hello");
    assert_eq!(item.timestamp, 1_700_000_000);

    let (summary, data): (String, String) = conn
        .query_row(
            "SELECT summary, data FROM event_log WHERE id = ?1",
            [item.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("should query inserted row");
    assert_eq!(summary, "Post published: Hello");
    assert_eq!(data, r#"{"title":"Hello"}"#);
}

#[test]
fn append_event_rejects_unregistered_type() {
    let conn = test_db();
    let catalogue = test_catalogue();

    let event = NewEvent::new(1, "never_registered", json!({}));
    let err = append_event(&conn, &catalogue, &event).expect_err("should reject");
    assert!(
        matches!(err, EventLogError::UnregisteredEventType(name) if name == "never_registered")
    );

    let count = count_events(&conn, &EventFilter::default()).unwrap();
    assert_eq!(count, 0, "nothing may be stored for a rejected event");
}

#[test]
fn appended_ids_strictly_increase() {
    let conn = test_db();
    let catalogue = test_catalogue();

    let mut last_id = 0;
    for i in 0..10 {
        let event = NewEvent::at(1, "post_published", 1_700_000_000 + i, json!({"title": "t"}));
        let item = append_event(&conn, &catalogue, &event).unwrap();
        assert!(item.id > last_id, "ids must be strictly increasing");
        last_id = item.id;
    }
}

// ── query / count contract ───────────────────────────────────────────

fn seed_events(conn: &Connection, catalogue: &EventTypeCatalogue) {
    for i in 0..5 {
        append_event(
            conn,
            catalogue,
            &NewEvent::at(
                1,
                "post_published",
                1_700_000_000 + i,
                json!({"title": format!("node-one post {i}")}),
            ),
        )
        .unwrap();
    }
    for i in 0..3 {
        append_event(
            conn,
            catalogue,
            &NewEvent::at(
                2,
                "reader_registered",
                1_700_000_100 + i,
                json!({"email": format!("reader{i}@example.com")}),
            ),
        )
        .unwrap();
    }
    append_event(
        conn,
        catalogue,
        &NewEvent::at(HUB_NODE_ID, "post_published", 1_700_000_200, json!({"title": "hub post"})),
    )
    .unwrap();
}

#[test]
fn query_defaults_to_newest_first() {
    let conn = test_db();
    let catalogue = test_catalogue();
    seed_events(&conn, &catalogue);

    let items = query_events(&conn, &EventFilter::default(), 100, 1).unwrap();
    assert_eq!(items.len(), 9);
    for pair in items.windows(2) {
        assert!(pair[0].id > pair[1].id, "descending id order expected");
    }
}

#[test]
fn count_matches_unpaginated_query_for_every_filter() {
    let conn = test_db();
    let catalogue = test_catalogue();
    seed_events(&conn, &catalogue);

    let filters = [
        EventFilter::default(),
        EventFilter {
            action_name: Some("post_published".to_string()),
            ..Default::default()
        },
        EventFilter {
            node_id: Some(2),
            ..Default::default()
        },
        EventFilter {
            search: Some("node-one".to_string()),
            ..Default::default()
        },
    ];

    for filter in &filters {
        let count = count_events(&conn, filter).unwrap();
        let items = query_events(&conn, filter, u32::MAX, 1).unwrap();
        assert_eq!(count as usize, items.len(), "filter: {filter:?}");
    }
}

#[test]
fn node_id_zero_selects_hub_local_events() {
    let conn = test_db();
    let catalogue = test_catalogue();
    seed_events(&conn, &catalogue);

    let filter = EventFilter {
        node_id: Some(HUB_NODE_ID),
        ..Default::default()
    };
    let items = query_events(&conn, &filter, 100, 1).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].summary, "Post published: hub post");
}

#[test]
fn search_matches_summary_and_raw_data() {
    let conn = test_db();
    let catalogue = test_catalogue();
    seed_events(&conn, &catalogue);

    // "New reader" only appears in summaries.
    let by_summary = EventFilter {
        search: Some("New reader".to_string()),
        ..Default::default()
    };
    assert_eq!(count_events(&conn, &by_summary).unwrap(), 3);

    // The email domain only appears in the raw payload.
    let by_data = EventFilter {
        search: Some("reader1@example.com".to_string()),
        ..Default::default()
    };
    assert_eq!(count_events(&conn, &by_data).unwrap(), 1);
}

#[test]
fn search_wildcards_match_literally() {
    let conn = test_db();
    let catalogue = test_catalogue();
    seed_events(&conn, &catalogue);

    append_event(
        &conn,
        &catalogue,
        &NewEvent::at(1, "post_published", 1_700_000_300, json!({"title": "100% done"})),
    )
    .unwrap();
    append_event(
        &conn,
        &catalogue,
        &NewEvent::at(1, "post_published", 1_700_000_301, json!({"title": "snake_case"})),
    )
    .unwrap();

    // "%" and "_" are not wildcards in a search term.
    let percent = EventFilter {
        search: Some("100%".to_string()),
        ..Default::default()
    };
    assert_eq!(count_events(&conn, &percent).unwrap(), 1);

    let bare_percent = EventFilter {
        search: Some("%".to_string()),
        ..Default::default()
    };
    assert_eq!(
        count_events(&conn, &bare_percent).unwrap(),
        1,
        "a bare % may only match the event containing a literal %"
    );

    let underscore = EventFilter {
        search: Some("e_c".to_string()),
        ..Default::default()
    };
    assert_eq!(
        count_events(&conn, &underscore).unwrap(),
        1,
        "underscore must not match arbitrary characters"
    );
}

#[test]
fn uncatalogued_action_filter_matches_nothing() {
    let conn = test_db();
    let catalogue = test_catalogue();
    seed_events(&conn, &catalogue);

    let filter = EventFilter {
        action_name: Some("never_registered".to_string()),
        ..Default::default()
    };
    assert_eq!(count_events(&conn, &filter).unwrap(), 0);
    assert!(query_events(&conn, &filter, 100, 1).unwrap().is_empty());
}

// ── pagination ───────────────────────────────────────────────────────

#[test]
fn pagination_covers_all_items_without_overlap() {
    let conn = test_db();
    let catalogue = test_catalogue();
    seed_events(&conn, &catalogue);

    let filter = EventFilter::default();
    let total = count_events(&conn, &filter).unwrap();
    assert_eq!(total, 9);

    let page_size = 4;
    let pages = total_pages(total, page_size);
    assert_eq!(pages, 3);

    let mut seen = Vec::new();
    let mut non_empty_pages = 0;
    for page in 1.. {
        let items = query_events(&conn, &filter, page_size, page).unwrap();
        if items.is_empty() {
            break;
        }
        non_empty_pages += 1;
        seen.extend(items.into_iter().map(|item| item.id));
    }

    assert_eq!(non_empty_pages, pages, "ceil(count/page_size) non-empty pages");
    assert_eq!(seen.len(), total as usize);
    for pair in seen.windows(2) {
        assert!(pair[0] > pair[1], "pages continue the descending order");
    }
}

#[test]
fn out_of_range_page_is_empty_not_an_error() {
    let conn = test_db();
    let catalogue = test_catalogue();
    seed_events(&conn, &catalogue);

    let filter = EventFilter::default();
    let before = count_events(&conn, &filter).unwrap();

    let items = query_events(&conn, &filter, 10, 99).expect("must not be an error");
    assert!(items.is_empty());

    assert_eq!(count_events(&conn, &filter).unwrap(), before);
}

#[test]
fn zero_pagination_parameters_are_rejected() {
    let conn = test_db();

    let err = query_events(&conn, &EventFilter::default(), 0, 1).expect_err("page_size 0");
    assert!(matches!(err, EventLogError::InvalidPagination { .. }));

    let err = query_events(&conn, &EventFilter::default(), 10, 0).expect_err("page_number 0");
    assert!(matches!(err, EventLogError::InvalidPagination { .. }));
}

// ── concurrency ──────────────────────────────────────────────────────

#[test]
fn concurrent_appends_assign_distinct_increasing_ids() {
    use std::sync::Arc;

    let db_file = tempfile::NamedTempFile::new().expect("should create temp db");
    let db_path = db_file.path().to_str().expect("temp path should be utf-8");

    let pool = lattice_db::create_pool(db_path, lattice_db::DbRuntimeSettings::default())
        .expect("should create pool");
    {
        let conn = pool.get().expect("should get connection");
        lattice_db::run_migrations(&conn).expect("migrations should succeed");
    }

    let catalogue = Arc::new(test_catalogue());
    const WRITERS: usize = 4;
    const EVENTS_PER_WRITER: usize = 25;

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let pool = pool.clone();
            let catalogue = Arc::clone(&catalogue);
            std::thread::spawn(move || {
                let conn = pool.get().expect("writer should get connection");
                let mut ids = Vec::with_capacity(EVENTS_PER_WRITER);
                for i in 0..EVENTS_PER_WRITER {
                    let event = NewEvent::at(
                        writer as i64 + 1,
                        "post_published",
                        1_700_000_000 + i as i64,
                        json!({"title": format!("writer {writer} event {i}")}),
                    );
                    let item =
                        append_event(&conn, &catalogue, &event).expect("append should succeed");
                    ids.push(item.id);
                }
                ids
            })
        })
        .collect();

    let mut all_ids: Vec<i64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().expect("writer thread should not panic"))
        .collect();

    assert_eq!(all_ids.len(), WRITERS * EVENTS_PER_WRITER);

    all_ids.sort_unstable();
    all_ids.dedup();
    assert_eq!(
        all_ids.len(),
        WRITERS * EVENTS_PER_WRITER,
        "no duplicate ids under concurrent writers"
    );

    let conn = pool.get().unwrap();
    let total = count_events(&conn, &EventFilter::default()).unwrap();
    assert_eq!(total as usize, WRITERS * EVENTS_PER_WRITER, "no lost events");
}
