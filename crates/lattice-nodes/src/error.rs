//! Error types for the node registry.

use thiserror::Error;

/// Errors that can occur during node registry operations.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A record store operation failed.
    #[error("node record store error: {0}")]
    Record(#[from] lattice_db::RecordError),

    /// A direct database operation failed.
    #[error("node database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Key generation failed (entropy source unavailable, bad stored material).
    #[error("node key operation failed: {0}")]
    Crypto(#[from] lattice_crypto::CryptoError),

    /// The record with this ID exists but is not a node record.
    #[error("record {0} is not a node")]
    NotANode(i64),

    /// No node with this ID exists.
    #[error("node {0} not found")]
    NotFound(i64),

    /// The supplied URL is not a well-formed absolute http(s) URL.
    #[error("invalid node URL: {0}")]
    InvalidUrl(String),

    /// Another node is already registered at this URL.
    #[error("a node is already registered at {0}")]
    DuplicateUrl(String),

    /// The node has no public key registered, so nothing can verify.
    #[error("node {0} has no public key registered")]
    MissingPublicKey(i64),

    /// The node has no application credentials stored.
    #[error("node {0} has no application credentials")]
    MissingCredentials(i64),

    /// A signed message failed verification against the node's public
    /// key. Surfaced as its own kind so callers can log and alert on
    /// repeated failures without conflating them with infra errors.
    #[error("message verification failed for node {node_id}: {source}")]
    Verification {
        /// The node whose key was used.
        node_id: i64,
        /// The underlying verification failure.
        source: lattice_crypto::CryptoError,
    },
}
