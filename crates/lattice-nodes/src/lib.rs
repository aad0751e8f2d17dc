//! Node registry for the Lattice hub.
//!
//! A node is one remote, independently administered site that reports
//! events to the hub. This crate is the source of truth for which nodes
//! exist: it owns the node identity records (URL, Ed25519 key pair,
//! symmetric secret key, application credentials) and the lifecycle
//! operations around them.
//!
//! Node records live in the generic record store under
//! `record_type = "node"` with a stable field-name contract
//! (`node-url`, `private-key`, `public-key`, `secret-key`, `app-user`,
//! `app-pass`) that other crates may depend on.

mod error;
mod node;
mod registry;

pub use error::NodeError;
pub use node::Node;
pub use registry::{
    create_node, delete_node, ensure_key_pair, ensure_secret_key, get_all_nodes, get_node,
    get_node_by_url, normalize_url, rotate_key_pair, set_app_credentials, update_node_url,
    validate_url, DeleteOutcome,
};

/// Record type tag for node records in the record store.
pub const NODE_RECORD_TYPE: &str = "node";

/// Field-name contract for node record fields.
pub mod fields {
    /// Canonical base URL (normalized, no trailing slash).
    pub const URL: &str = "node-url";
    /// Hex-encoded Ed25519 signing key (issued to the node).
    pub const PRIVATE_KEY: &str = "private-key";
    /// Hex-encoded Ed25519 verifying key.
    pub const PUBLIC_KEY: &str = "public-key";
    /// Base64-encoded symmetric secret key, generated once.
    pub const SECRET_KEY: &str = "secret-key";
    /// Application user for hub-initiated Basic auth calls.
    pub const APP_USER: &str = "app-user";
    /// Application password for hub-initiated Basic auth calls.
    pub const APP_PASS: &str = "app-pass";
    /// Tombstone marker: set to "1" when the node is soft-deleted.
    pub const DELETED: &str = "deleted";
}
