//! Storage-column value types shared between the Field Codec (cache-storage)
//! and the Query Builder (cache-query).

use std::collections::HashMap;

/// A single physical column's value, typed the way SQLite stores it.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Integer(Option<i64>),
    Real(Option<f64>),
}

impl ColumnValue {
    /// `true` literal JSON array marker used for the `is_empty` family —
    /// spec.md §4.2 requires storing `"[]"`, never `NULL`, for empty arrays.
    pub fn is_sql_null(&self) -> bool {
        matches!(
            self,
            Self::Text(None) | Self::Integer(None) | Self::Real(None)
        )
    }
}

/// The set of `(column_name, value)` pairs a single field value encodes to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedColumns(pub Vec<(String, ColumnValue)>);

impl EncodedColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: ColumnValue) {
        self.0.push((column.into(), value));
    }
}

/// A reconstructed record: slug-keyed upstream-shaped JSON values, assembled
/// by the Field Codec from a row's raw columns (spec.md §4.2).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValue(pub HashMap<String, serde_json::Value>);

impl FieldValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slug: impl Into<String>, value: serde_json::Value) {
        self.0.insert(slug.into(), value);
    }

    pub fn get(&self, slug: &str) -> Option<&serde_json::Value> {
        self.0.get(slug)
    }
}
