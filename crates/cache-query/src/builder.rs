//! Chainable query builder (D, spec.md §4.4) over one table's cached rows.
//!
//! Mirrors the dynamic `WHERE`-clause assembly style of
//! `beads-storage/src/sqlite/queries.rs`: clauses accumulate as strings,
//! params accumulate as boxed [`rusqlite::types::ToSql`] values, and the
//! whole thing is handed to storage as one parameterised statement.

use rusqlite::types::ToSql;
use tracing::debug;

use cache_core::{FilterValue, Operator, TimezoneConfig};
use cache_storage::SqliteStore;

use crate::compile::compile_condition;
use crate::error::{QueryError, Result};

/// Ascending/descending sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A chainable query against one upstream table's cached records.
///
/// Built with `&mut self` methods returning `&mut Self` so callers can
/// either chain (`query.where_eq(..).limit(10)`) or build up conditionally
/// across several statements before calling [`Query::execute`].
pub struct Query<'a> {
    store: &'a SqliteStore,
    table_id: String,
    tz: TimezoneConfig,
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
    order: Option<(String, SortDirection)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl<'a> Query<'a> {
    pub fn new(store: &'a SqliteStore, table_id: impl Into<String>, tz: TimezoneConfig) -> Self {
        Self {
            store,
            table_id: table_id.into(),
            tz,
            clauses: Vec::new(),
            params: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }

    /// Adds a leaf condition `field comparison value`, resolved against the
    /// table's current field catalogue.
    pub fn where_condition(&mut self, field: &str, op: Operator, value: &FilterValue) -> Result<&mut Self> {
        let registry = self
            .store
            .get_registry(&self.table_id)?
            .ok_or_else(|| QueryError::UnknownField {
                table_id: self.table_id.clone(),
                slug: field.to_string(),
            })?;
        let compiled = compile_condition(&registry, field, op, value, &self.tz)?;
        self.clauses.push(compiled.sql);
        self.params.extend(compiled.params);
        Ok(self)
    }

    /// Appends a pre-compiled SQL fragment (e.g. a parenthesised group from
    /// the Filter Translator) and its params verbatim.
    pub fn where_raw(&mut self, sql: impl Into<String>, params: Vec<Box<dyn ToSql>>) -> &mut Self {
        self.clauses.push(sql.into());
        self.params.extend(params);
        self
    }

    /// Translates a whole portable filter tree (spec.md §4.8) and adds it as
    /// one condition, ANDed with whatever is already on the query.
    pub fn where_filter_tree(&mut self, node: &cache_core::filter::FilterNode) -> Result<&mut Self> {
        let registry = self
            .store
            .get_registry(&self.table_id)?
            .ok_or_else(|| QueryError::UnknownField {
                table_id: self.table_id.clone(),
                slug: String::new(),
            })?;
        let compiled = crate::translator::translate(&registry, node, &self.tz)?;
        debug!(table_id = %self.table_id, sql = %compiled.sql, "compiled filter tree");
        self.clauses.push(compiled.sql);
        self.params.extend(compiled.params);
        Ok(self)
    }

    /// Orders results by a field slug's principal column.
    pub fn order_by(&mut self, field: &str, direction: SortDirection) -> Result<&mut Self> {
        let registry = self
            .store
            .get_registry(&self.table_id)?
            .ok_or_else(|| QueryError::UnknownField {
                table_id: self.table_id.clone(),
                slug: field.to_string(),
            })?;
        let (column, _) = crate::compile::resolve_principal_column(&registry, field)?;
        self.order = Some((column, direction));
        Ok(self)
    }

    pub fn limit(&mut self, n: i64) -> &mut Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(&mut self, n: i64) -> &mut Self {
        self.offset = Some(n);
        self
    }

    /// Runs the accumulated conditions and returns the matching records.
    pub fn execute(&self) -> Result<Vec<cache_storage::RawRecord>> {
        let where_sql = self.joined_where();
        let order_sql = self.order.as_ref().map(|(col, dir)| {
            let keyword = match dir {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{col} {keyword}")
        });
        let bound: Vec<&dyn ToSql> = self.params.iter().map(|p| p.as_ref()).collect();
        let rows = self.store.query_records(
            &self.table_id,
            where_sql.as_deref(),
            &bound,
            order_sql.as_deref(),
            self.limit,
            self.offset,
        )?;
        debug!(table_id = %self.table_id, count = rows.len(), "query executed");
        Ok(rows)
    }

    /// Counts rows matching the accumulated conditions, ignoring
    /// `limit`/`offset`/`order_by`.
    pub fn count(&self) -> Result<i64> {
        let where_sql = self.joined_where();
        let bound: Vec<&dyn ToSql> = self.params.iter().map(|p| p.as_ref()).collect();
        Ok(self.store.count_matching(&self.table_id, where_sql.as_deref(), &bound)?)
    }

    fn joined_where(&self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(self.clauses.join(" AND "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_core::{field::FieldParams, FieldDescriptor, FieldType, TableDescriptor};
    use serde_json::json;
    use std::collections::HashMap;

    fn structure() -> TableDescriptor {
        TableDescriptor {
            table_id: "tbl_1".to_string(),
            name: "Tasks".to_string(),
            fields: vec![
                FieldDescriptor {
                    slug: "f_status".to_string(),
                    label: "Status".to_string(),
                    field_type: FieldType::Status,
                    params: FieldParams::default(),
                },
                FieldDescriptor {
                    slug: "f_priority".to_string(),
                    label: "Priority".to_string(),
                    field_type: FieldType::Number,
                    params: FieldParams::default(),
                },
            ],
        }
    }

    fn record(id: &str, status: &str, priority: f64) -> cache_storage::RawRecord {
        let mut fields = HashMap::new();
        fields.insert("f_status".to_string(), json!({"id": status}));
        fields.insert("f_priority".to_string(), json!(priority));
        cache_storage::RawRecord { id: id.to_string(), fields }
    }

    #[test]
    fn where_condition_filters_by_status() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = structure();
        store
            .replace_all(&s, &[record("a", "open", 1.0), record("b", "done", 2.0), record("c", "open", 3.0)], 3600)
            .unwrap();

        let mut query = Query::new(&store, "tbl_1", TimezoneConfig::Utc);
        query.where_condition("f_status", Operator::Eq, &FilterValue::Scalar(json!("open"))).unwrap();
        let rows = query.execute().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn order_by_and_limit_compose() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = structure();
        store
            .replace_all(&s, &[record("a", "open", 3.0), record("b", "open", 1.0), record("c", "open", 2.0)], 3600)
            .unwrap();

        let mut query = Query::new(&store, "tbl_1", TimezoneConfig::Utc);
        query.order_by("f_priority", SortDirection::Asc).unwrap().limit(1);
        let rows = query.execute().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "b");
    }

    #[test]
    fn count_ignores_limit() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = structure();
        store
            .replace_all(&s, &[record("a", "open", 1.0), record("b", "open", 2.0)], 3600)
            .unwrap();

        let mut query = Query::new(&store, "tbl_1", TimezoneConfig::Utc);
        query.limit(1);
        assert_eq!(query.count().unwrap(), 2);
    }

    #[test]
    fn where_filter_tree_compiles_nested_groups() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = structure();
        store
            .replace_all(&s, &[record("a", "open", 3.0), record("b", "done", 1.0), record("c", "open", 0.0)], 3600)
            .unwrap();

        let tree = json!({
            "operator": "and",
            "fields": [
                {"field": "f_status", "comparison": "eq", "value": "open"},
                {"field": "f_priority", "comparison": "gte", "value": 1}
            ]
        });
        let node = cache_core::FilterGroup::parse(&tree).unwrap();

        let mut query = Query::new(&store, "tbl_1", TimezoneConfig::Utc);
        query.where_filter_tree(&node).unwrap();
        let rows = query.execute().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.replace_all(&structure(), &[record("a", "open", 1.0)], 3600).unwrap();
        let mut query = Query::new(&store, "tbl_1", TimezoneConfig::Utc);
        let err = query.where_condition("nope", Operator::Eq, &FilterValue::Scalar(json!("x"))).unwrap_err();
        assert!(matches!(err, QueryError::UnknownField { .. }));
    }
}
