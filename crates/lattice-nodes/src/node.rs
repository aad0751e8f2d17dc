//! The `Node` value type.

use lattice_db::Record;

use crate::error::NodeError;
use crate::{fields, NODE_RECORD_TYPE};

/// One registered remote node.
///
/// A `Node` is only ever constructed from a record that actually is a
/// node record with a URL — [`Node::from_record`] fails with
/// [`NodeError::NotANode`] otherwise, so every accessor on a
/// constructed value is meaningful. There is no partially valid state.
#[derive(Debug, Clone)]
pub struct Node {
    id: i64,
    url: String,
    private_key: Option<String>,
    public_key: Option<String>,
    secret_key: Option<String>,
    app_user: Option<String>,
    app_pass: Option<String>,
    deleted: bool,
}

impl Node {
    /// Builds a `Node` from a loaded record.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::NotANode`] if the record is not of the node
    /// record type or has no URL field.
    pub fn from_record(record: &Record) -> Result<Self, NodeError> {
        if record.record_type != NODE_RECORD_TYPE {
            return Err(NodeError::NotANode(record.id));
        }
        let url = match record.field(fields::URL) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => return Err(NodeError::NotANode(record.id)),
        };

        let owned = |key: &str| record.field(key).map(str::to_string);

        Ok(Self {
            id: record.id,
            url,
            private_key: owned(fields::PRIVATE_KEY),
            public_key: owned(fields::PUBLIC_KEY),
            secret_key: owned(fields::SECRET_KEY),
            app_user: owned(fields::APP_USER),
            app_pass: owned(fields::APP_PASS),
            deleted: record.field(fields::DELETED) == Some("1"),
        })
    }

    /// The node's registry ID. Immutable once assigned.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// The node's canonical base URL (normalized, no trailing slash).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The hex-encoded Ed25519 signing key issued to this node, if any.
    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_deref()
    }

    /// The hex-encoded Ed25519 verifying key, if any.
    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    /// The base64-encoded symmetric secret key, if generated.
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }

    /// The application user for hub-initiated calls, if configured.
    pub fn app_user(&self) -> Option<&str> {
        self.app_user.as_deref()
    }

    /// The application password for hub-initiated calls, if configured.
    pub fn app_pass(&self) -> Option<&str> {
        self.app_pass.as_deref()
    }

    /// Whether this node has been soft-deleted (tombstoned).
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Builds the `Authorization` header value the hub uses when
    /// calling this node (hub proving itself to the node).
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::MissingCredentials`] if either credential
    /// half is absent.
    pub fn authorization_header(&self) -> Result<String, NodeError> {
        match (self.app_user.as_deref(), self.app_pass.as_deref()) {
            (Some(user), Some(pass)) => Ok(lattice_crypto::basic_auth_header(user, pass)),
            _ => Err(NodeError::MissingCredentials(self.id)),
        }
    }

    /// Verifies that a signed message was produced with this node's
    /// private key (node proving itself to the hub).
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::MissingPublicKey`] if no public key is
    /// registered, and [`NodeError::Verification`] for malformed or
    /// mismatched signatures. A message is only trusted on `Ok`.
    pub fn verify_signed_message(
        &self,
        message: &[u8],
        signature_hex: &str,
    ) -> Result<(), NodeError> {
        let public_key = self
            .public_key
            .as_deref()
            .ok_or(NodeError::MissingPublicKey(self.id))?;

        lattice_crypto::verify_signed_message(message, signature_hex, public_key).map_err(
            |source| NodeError::Verification {
                node_id: self.id,
                source,
            },
        )
    }
}
