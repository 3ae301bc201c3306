//! Orchestration-layer error types.

use thiserror::Error;

/// Errors from the Orchestration layer (spec.md §2 item 3, §7).
#[derive(Debug, Error)]
pub enum EngineError {
    /// A parameter was missing, of the wrong type, or named an unknown
    /// field slug / unsupported operator (spec.md §7's validation class;
    /// never retried).
    #[error("validation error: {0}")]
    Validation(String),

    /// The upstream API call failed or returned a non-success response.
    #[error(transparent)]
    Upstream(#[from] cache_upstream::UpstreamError),

    /// A cache-internal fault: schema evolution failure, SQL error.
    #[error(transparent)]
    Storage(#[from] cache_storage::StorageError),

    /// A filter/query compilation fault.
    #[error(transparent)]
    Query(#[from] cache_query::QueryError),

    /// The operation's timeout elapsed before the upstream call returned;
    /// any in-flight request is abandoned (spec.md §5).
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The requested entity does not exist in cache or upstream.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
}

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
