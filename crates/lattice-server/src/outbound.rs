//! Hub-initiated requests to nodes.
//!
//! The hub calls a node's API using the per-node application
//! credentials issued at registration. Transport failures are
//! classified: a timeout or connection failure is transient and
//! retryable, and says nothing about the node's standing.

use lattice_nodes::{Node, NodeError};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from a hub-to-node request.
#[derive(Debug, Error)]
pub enum OutboundError {
    /// The node has no stored application credentials.
    #[error(transparent)]
    Credentials(#[from] NodeError),
    /// Transport-level failure (timeout, connect, DNS). Retryable.
    #[error("transient request failure: {0}")]
    Transient(reqwest::Error),
    /// Any other HTTP failure, including non-2xx statuses.
    #[error("request failed: {0}")]
    Http(reqwest::Error),
}

impl OutboundError {
    pub fn is_transient(&self) -> bool {
        matches!(self, OutboundError::Transient(_))
    }
}

fn classify(e: reqwest::Error) -> OutboundError {
    if e.is_timeout() || e.is_connect() {
        OutboundError::Transient(e)
    } else {
        OutboundError::Http(e)
    }
}

/// Builds the shared outbound client with a bounded per-request timeout.
pub fn build_client(timeout_ms: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(timeout_ms))
        .build()
}

/// Joins a request path onto a node's base URL. Node URLs are stored
/// without a trailing slash.
pub fn node_endpoint(node: &Node, path: &str) -> String {
    format!("{}/{}", node.url(), path.trim_start_matches('/'))
}

/// Issues an authenticated GET against a node and decodes the JSON body.
///
/// # Errors
///
/// Returns `OutboundError::Credentials` if the node has no stored
/// application credentials, `Transient` on timeout or connection
/// failure, and `Http` on any other failure including a non-2xx status.
pub async fn node_get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    node: &Node,
    path: &str,
) -> Result<T, OutboundError> {
    let auth = node.authorization_header()?;
    let response = client
        .get(node_endpoint(node, path))
        .header(reqwest::header::AUTHORIZATION, auth)
        .send()
        .await
        .map_err(classify)?;

    let response = response.error_for_status().map_err(OutboundError::Http)?;
    response.json().await.map_err(OutboundError::Http)
}

/// Issues an authenticated POST with a JSON body against a node.
pub async fn node_post_json<B: serde::Serialize, T: DeserializeOwned>(
    client: &reqwest::Client,
    node: &Node,
    path: &str,
    body: &B,
) -> Result<T, OutboundError> {
    let auth = node.authorization_header()?;
    let response = client
        .post(node_endpoint(node, path))
        .header(reqwest::header::AUTHORIZATION, auth)
        .json(body)
        .send()
        .await
        .map_err(classify)?;

    let response = response.error_for_status().map_err(OutboundError::Http)?;
    response.json().await.map_err(OutboundError::Http)
}
