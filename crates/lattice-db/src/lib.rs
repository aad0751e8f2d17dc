//! Database layer for the Lattice hub.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode
//! initialization, embedded SQL migrations, and the generic record
//! store that backs node records. Every table in the hub is created
//! through versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: the hub is a single coordinating
//!   instance — no external database process required. WAL mode allows
//!   concurrent readers with a single writer, which matches the hub's
//!   read-mostly access pattern.
//! - **`r2d2` connection pool**: bounded connection reuse without
//!   manual lifetime management.
//! - **Embedded migrations**: SQL files are compiled into the binary
//!   via `include_str!`, so migrations ship with the server and cannot
//!   drift from the code that depends on them.
//! - **Generic record store**: node identity records are stored as a
//!   record row plus string fields keyed by a stable field-name
//!   contract (`node-url`, `private-key`, ...), keeping the registry
//!   decoupled from any particular schema.

mod migrations;
mod pool;
mod records;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use records::{
    create_record, delete_record, get_field, get_record, query_records, update_field, Record,
    RecordError,
};
