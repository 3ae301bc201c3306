//! Query builder / filter translation error types.

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The field slug (or `id`) does not exist in the table's field catalogue.
    #[error("unknown field `{slug}` for table {table_id}")]
    UnknownField { table_id: String, slug: String },

    /// A filter value had the wrong shape for its operator (e.g. `between`
    /// without a two-element array).
    #[error("invalid value for `{operator}` on `{field}`: {message}")]
    InvalidValue {
        field: String,
        operator: String,
        message: String,
    },

    /// The underlying storage layer failed.
    #[error(transparent)]
    Storage(#[from] cache_storage::StorageError),

    /// A domain-level error from `cache-core`.
    #[error(transparent)]
    Core(#[from] cache_core::CoreError),

    /// A raw SQLite query error.
    #[error("query error: {0}")]
    Sql(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;
