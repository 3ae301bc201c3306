//! Record Store (C, spec.md §4.3): bulk-replace, single-record upsert,
//! single-record delete against a dynamic `cache_records_*` table.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params_from_iter, types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::debug;

use cache_core::value::ColumnValue;
use cache_core::FieldType;

use crate::codec::{decode_field, encode_field, recover_stem};
use crate::error::{Result, StorageError};
use crate::registry::RegistryRow;
use crate::sqlite::SqliteStore;

/// An upstream record as the Record Store sees it: `id` plus slug-keyed
/// field values.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub fields: HashMap<String, Value>,
}

impl SqliteStore {
    /// `replace_all(table_id, structure, records, ttl)` (spec.md §4.3):
    /// ensures schema, then replaces every row in one transaction so readers
    /// never observe a half-written record set.
    pub fn replace_all(&self, structure: &cache_core::TableDescriptor, records: &[RawRecord], ttl_seconds: i64) -> Result<()> {
        let sql_table_name = self.ensure_table(structure)?;
        let row = self
            .get_registry(&structure.table_id)?
            .ok_or_else(|| StorageError::NotRegistered {
                table_id: structure.table_id.clone(),
            })?;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction().map_err(StorageError::from)?;
        tx.execute(&format!("DELETE FROM {sql_table_name}"), [])?;

        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl_seconds);
        for record in records {
            insert_row(&tx, &sql_table_name, &row, record, now, expires_at)?;
        }
        tx.commit().map_err(StorageError::from)?;

        debug!(table_id = %structure.table_id, count = records.len(), "replace_all committed");
        Ok(())
    }

    /// `upsert_one(table_id, record)` (spec.md §4.3): requires the table has
    /// been seen before. Delete-then-insert under a single lock acquisition
    /// so no other writer observes an absent row mid-update.
    pub fn upsert_one(&self, table_id: &str, record: &RawRecord, ttl_seconds: i64) -> Result<()> {
        let row = self
            .get_registry(table_id)?
            .ok_or_else(|| StorageError::NotRegistered {
                table_id: table_id.to_string(),
            })?;

        let conn = self.lock_conn()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", row.sql_table_name),
            rusqlite::params![record.id],
        )?;

        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl_seconds);
        insert_row(&conn, &row.sql_table_name, &row, record, now, expires_at)?;
        Ok(())
    }

    /// `delete_one(table_id, record_id)` (spec.md §4.3).
    pub fn delete_one(&self, table_id: &str, record_id: &str) -> Result<()> {
        let row = self
            .get_registry(table_id)?
            .ok_or_else(|| StorageError::NotRegistered {
                table_id: table_id.to_string(),
            })?;
        let conn = self.lock_conn()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", row.sql_table_name),
            rusqlite::params![record_id],
        )?;
        Ok(())
    }

    /// `valid?(table_id)` (spec.md §4.3): true iff at least one row with
    /// `expires_at > now` exists.
    pub fn table_valid(&self, table_id: &str) -> Result<bool> {
        let Some(row) = self.get_registry(table_id)? else {
            return Ok(false);
        };
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE expires_at > ?1", row.sql_table_name),
            rusqlite::params![now],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Runs an arbitrary WHERE clause (as compiled by the Query Builder)
    /// against one table's cached rows, always scoped to `expires_at > now`.
    /// `where_sql`/`params` are appended with `AND (..)`; `order_sql` is
    /// inserted verbatim after `ORDER BY`.
    pub fn query_records(
        &self,
        table_id: &str,
        where_sql: Option<&str>,
        params: &[&dyn rusqlite::types::ToSql],
        order_sql: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawRecord>> {
        let Some(row) = self.get_registry(table_id)? else {
            return Ok(Vec::new());
        };
        let conn = self.lock_conn()?;
        let all_columns = row.field_mapping.all_columns();
        let select_cols = all_columns.join(", ");
        let now = Utc::now().to_rfc3339();

        let mut sql = format!("SELECT id, {select_cols} FROM {} WHERE expires_at > ?", row.sql_table_name);
        let mut bound: Vec<&dyn rusqlite::types::ToSql> = vec![&now];
        if let Some(clause) = where_sql {
            sql.push_str(" AND (");
            sql.push_str(clause);
            sql.push(')');
            bound.extend_from_slice(params);
        }
        if let Some(order) = order_sql {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        if let Some(n) = offset {
            sql.push_str(&format!(" OFFSET {n}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(bound.as_slice(), |r| {
            let id: String = r.get("id")?;
            let mut raw_columns: HashMap<String, ColumnValue> = HashMap::new();
            for name in &all_columns {
                raw_columns.insert(name.clone(), column_value_from_row(r, name)?);
            }
            Ok((id, raw_columns))
        })?;

        let mut out = Vec::new();
        for entry in rows {
            let (id, raw_columns) = entry?;
            out.push(reconstruct_record(id, &row, &raw_columns));
        }
        Ok(out)
    }

    /// Counts rows matching the same WHERE clause `query_records` would
    /// apply, without materialising them.
    pub fn count_matching(&self, table_id: &str, where_sql: Option<&str>, params: &[&dyn rusqlite::types::ToSql]) -> Result<i64> {
        let Some(row) = self.get_registry(table_id)? else {
            return Ok(0);
        };
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let mut sql = format!("SELECT COUNT(*) FROM {} WHERE expires_at > ?", row.sql_table_name);
        let mut bound: Vec<&dyn rusqlite::types::ToSql> = vec![&now];
        if let Some(clause) = where_sql {
            sql.push_str(" AND (");
            sql.push_str(clause);
            sql.push(')');
            bound.extend_from_slice(params);
        }
        let count: i64 = conn.query_row(&sql, bound.as_slice(), |r| r.get(0))?;
        Ok(count)
    }

    /// `get_one(table_id, record_id)` (spec.md §4.3): returns the
    /// reconstructed record if the cache is valid and the row is present.
    pub fn get_one(&self, table_id: &str, record_id: &str) -> Result<Option<RawRecord>> {
        let Some(row) = self.get_registry(table_id)? else {
            return Ok(None);
        };
        if !self.table_valid(table_id)? {
            return Ok(None);
        }

        let conn = self.lock_conn()?;
        let all_columns = row.field_mapping.all_columns();
        let select_cols = all_columns.join(", ");
        let sql = format!("SELECT id, {select_cols} FROM {} WHERE id = ?1", row.sql_table_name);

        let found = conn
            .query_row(&sql, rusqlite::params![record_id], |r| {
                let id: String = r.get("id")?;
                let mut raw_columns: HashMap<String, ColumnValue> = HashMap::new();
                for name in &all_columns {
                    raw_columns.insert(name.clone(), column_value_from_row(r, name)?);
                }
                Ok((id, raw_columns))
            })
            .optional()?;

        let Some((id, raw_columns)) = found else {
            return Ok(None);
        };
        Ok(Some(reconstruct_record(id, &row, &raw_columns)))
    }

    /// Recomputes `{stem}_is_overdue` for every `due_date`-typed field in
    /// `table_id` against the current date, rather than trusting whatever
    /// upstream last reported (spec.md §9 Open Question #1). Not called
    /// implicitly by `get_one`/`query_records` -- an explicit maintenance
    /// operation the orchestration layer can schedule or expose.
    pub fn refresh_overdue_flags(&self, table_id: &str) -> Result<usize> {
        let Some(row) = self.get_registry(table_id)? else {
            return Ok(0);
        };
        let conn = self.lock_conn()?;
        let mut total = 0usize;
        for field in &row.structure.fields {
            if field.field_type != FieldType::DueDate {
                continue;
            }
            let Some(cols) = row.field_mapping.0.get(&field.slug) else {
                continue;
            };
            let stem = recover_stem(field.field_type, cols, &field.slug);
            let sql = format!(
                "UPDATE {table} SET {stem}_is_overdue = CASE \
                    WHEN {stem}_to IS NOT NULL AND {stem}_to < date('now') AND {stem}_is_completed = 0 THEN 1 \
                    ELSE 0 END",
                table = row.sql_table_name,
            );
            total += conn.execute(&sql, [])?;
        }
        Ok(total)
    }
}

fn insert_row(
    conn: &Connection,
    sql_table_name: &str,
    registry: &RegistryRow,
    record: &RawRecord,
    cached_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let mut columns: Vec<String> = vec!["id".to_string(), "cached_at".to_string(), "expires_at".to_string()];
    let mut values: Vec<SqlValue> = vec![
        SqlValue::Text(record.id.clone()),
        SqlValue::Text(cached_at.to_rfc3339()),
        SqlValue::Text(expires_at.to_rfc3339()),
    ];

    for field in &registry.structure.fields {
        let Some(cols) = registry.field_mapping.0.get(&field.slug) else {
            continue;
        };
        let stem = recover_stem(field.field_type, cols, &field.slug);
        let value = record.fields.get(&field.slug).cloned().unwrap_or(Value::Null);
        let encoded = encode_field(field.field_type, &stem, &value);
        for (name, _) in cols {
            let cv = encoded.get(name).cloned().unwrap_or(ColumnValue::Text(None));
            columns.push(name.clone());
            values.push(sql_value_of(cv));
        }
    }

    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {sql_table_name} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, params_from_iter(values))?;
    Ok(())
}

fn sql_value_of(value: ColumnValue) -> SqlValue {
    match value {
        ColumnValue::Text(v) => v.map(SqlValue::Text).unwrap_or(SqlValue::Null),
        ColumnValue::Integer(v) => v.map(SqlValue::Integer).unwrap_or(SqlValue::Null),
        ColumnValue::Real(v) => v.map(SqlValue::Real).unwrap_or(SqlValue::Null),
    }
}

fn column_value_from_row(row: &rusqlite::Row<'_>, name: &str) -> rusqlite::Result<ColumnValue> {
    match row.get_ref(name.as_str())? {
        rusqlite::types::ValueRef::Null => Ok(ColumnValue::Text(None)),
        rusqlite::types::ValueRef::Integer(i) => Ok(ColumnValue::Integer(Some(i))),
        rusqlite::types::ValueRef::Real(f) => Ok(ColumnValue::Real(Some(f))),
        rusqlite::types::ValueRef::Text(t) => Ok(ColumnValue::Text(Some(String::from_utf8_lossy(t).into_owned()))),
        rusqlite::types::ValueRef::Blob(_) => Ok(ColumnValue::Text(None)),
    }
}

fn reconstruct_record(id: String, registry: &RegistryRow, raw_columns: &HashMap<String, ColumnValue>) -> RawRecord {
    let mut fields = Map::new();
    for field in &registry.structure.fields {
        let Some(cols) = registry.field_mapping.0.get(&field.slug) else {
            continue;
        };
        let stem = recover_stem(field.field_type, cols, &field.slug);
        let mut scoped: HashMap<String, ColumnValue> = HashMap::new();
        for (name, _) in cols {
            if let Some(v) = raw_columns.get(name) {
                scoped.insert(name.clone(), v.clone());
            }
        }
        let value = decode_field(field.field_type, &stem, &scoped);
        fields.insert(field.slug.clone(), value);
    }
    RawRecord {
        id,
        fields: fields.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_core::{field::FieldParams, FieldDescriptor, FieldType, TableDescriptor};
    use serde_json::json;

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
                    slug: "f_assigned".to_string(),
                    label: "Assigned To".to_string(),
                    field_type: FieldType::AssignedTo,
                    params: FieldParams::default(),
                },
            ],
        }
    }

    fn record(id: &str, status: &str, assigned: Vec<&str>) -> RawRecord {
        let mut fields = HashMap::new();
        fields.insert("f_status".to_string(), json!({"id": status}));
        fields.insert(
            "f_assigned".to_string(),
            json!(assigned.into_iter().collect::<Vec<_>>()),
        );
        RawRecord { id: id.to_string(), fields }
    }

    #[test]
    fn replace_all_then_read_all_returns_exactly_inserted_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = structure();
        let records = vec![record("a", "open", vec!["u1"]), record("b", "done", vec![])];
        store.replace_all(&s, &records, 3600).unwrap();

        let a = store.get_one("tbl_1", "a").unwrap().unwrap();
        assert_eq!(a.fields["f_status"]["id"], json!("open"));
        let b = store.get_one("tbl_1", "b").unwrap().unwrap();
        assert_eq!(b.fields["f_assigned"], json!([]));
    }

    #[test]
    fn upsert_one_keeps_siblings_and_is_visible_via_get_one() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = structure();
        let records = vec![record("a", "open", vec![]), record("b", "open", vec![]), record("c", "open", vec![])];
        store.replace_all(&s, &records, 3600).unwrap();

        let updated = record("b", "done", vec!["u9"]);
        store.upsert_one("tbl_1", &updated, 3600).unwrap();

        let b = store.get_one("tbl_1", "b").unwrap().unwrap();
        assert_eq!(b.fields["f_status"]["id"], json!("done"));
        assert!(store.get_one("tbl_1", "a").unwrap().is_some());
        assert!(store.get_one("tbl_1", "c").unwrap().is_some());
    }

    #[test]
    fn delete_one_removes_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = structure();
        store.replace_all(&s, &[record("a", "open", vec![])], 3600).unwrap();
        store.delete_one("tbl_1", "a").unwrap();
        assert!(store.get_one("tbl_1", "a").unwrap().is_none());
    }

    #[test]
    fn table_valid_false_after_replace_with_zero_ttl_in_past() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = structure();
        store.replace_all(&s, &[record("a", "open", vec![])], -10).unwrap();
        assert!(!store.table_valid("tbl_1").unwrap());
    }

    #[test]
    fn query_records_applies_where_clause_and_limit() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = structure();
        let records = vec![record("a", "open", vec![]), record("b", "open", vec![]), record("c", "done", vec![])];
        store.replace_all(&s, &records, 3600).unwrap();

        let status: &dyn rusqlite::types::ToSql = &"open";
        let rows = store.query_records("tbl_1", Some("status = ?"), &[status], Some("id ASC"), Some(1), None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a");
    }

    #[test]
    fn count_matching_mirrors_query_records_filter() {
        let store = SqliteStore::open_in_memory().unwrap();
        let s = structure();
        let records = vec![record("a", "open", vec![]), record("b", "open", vec![]), record("c", "done", vec![])];
        store.replace_all(&s, &records, 3600).unwrap();

        let status: &dyn rusqlite::types::ToSql = &"open";
        let count = store.count_matching("tbl_1", Some("status = ?"), &[status]).unwrap();
        assert_eq!(count, 2);
    }
}
