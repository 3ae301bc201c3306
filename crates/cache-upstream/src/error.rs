//! Upstream client error types.

use thiserror::Error;

/// Errors from the external no-code workspace API boundary.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request reached the server but it returned a non-success status.
    #[error("upstream returned {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, preserved verbatim for the caller to inspect.
        body: String,
    },

    /// Transport-level failure: DNS, TLS, connection refused, timeout.
    #[error("upstream transport error: {0}")]
    Transport(#[from] ureq::Error),

    /// The response body was not valid JSON, or didn't match the expected
    /// shape.
    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The requested entity does not exist upstream.
    #[error("{entity} not found upstream: {id}")]
    NotFound {
        /// The kind of entity (e.g. `"table"`, `"record"`).
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },
}

/// A specialized `Result` type for upstream client operations.
pub type Result<T> = std::result::Result<T, UpstreamError>;
