//! Errors shared by the core domain types.

/// Errors that can occur while working with field catalogues, filters, or
/// record values, independent of any storage or transport backend.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A field slug referenced by a filter or projection does not exist in
    /// the table's field catalogue.
    #[error("unknown field slug: {0}")]
    UnknownField(String),

    /// An operator was used against a field type that does not support it.
    #[error("operator {operator} is not supported for field type {field_type}")]
    UnsupportedOperator {
        /// The operator token, e.g. `"is_overdue"`.
        operator: String,
        /// The field type's string tag, e.g. `"text"`.
        field_type: String,
    },

    /// A value failed to parse as the shape the field type expects.
    #[error("invalid value for field {slug} ({field_type}): {message}")]
    InvalidValue {
        /// The field slug the value was destined for.
        slug: String,
        /// The field type's string tag.
        field_type: String,
        /// Description of why the value was rejected.
        message: String,
    },

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias used throughout `cache-core`.
pub type Result<T> = std::result::Result<T, CoreError>;
