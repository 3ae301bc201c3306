//! Schema Registry (A, spec.md §4.1): maps an upstream table-id to a local
//! physical table, derives its column set from a field catalogue, and
//! persists the slug → column mapping so extraction never has to
//! regenerate a name.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use cache_core::{
    table::{dedupe_column_names, physical_table_name, sanitize_identifier, FieldMapping, SlugColumns},
    ColumnType, FieldDescriptor, TableDescriptor,
};

use crate::error::{Result, StorageError};
use crate::sqlite::SqliteStore;

/// The persisted registry row for one upstream table.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryRow {
    pub table_id: String,
    pub sql_table_name: String,
    pub table_name: String,
    pub structure: TableDescriptor,
    pub field_mapping: FieldMapping,
}

/// Fields that always exist regardless of the field catalogue.
const ALWAYS_INDEXED: &[&str] = &["expires_at"];

impl SqliteStore {
    /// `ensure(table_id, structure) → physical_table_name` (spec.md §4.1).
    ///
    /// Creates the physical table and registry row on first sight; on later
    /// calls, evolves the schema additively when the field catalogue grew.
    pub fn ensure_table(&self, structure: &TableDescriptor) -> Result<String> {
        let conn = self.lock_conn()?;
        match get_registry_row(&conn, &structure.table_id)? {
            Some(existing) => evolve_table(&conn, &existing, structure),
            None => create_table(&conn, structure),
        }
    }

    /// `get(table_id) → {sql_table_name, structure, field_mapping}` or
    /// absent (spec.md §4.1).
    pub fn get_registry(&self, table_id: &str) -> Result<Option<RegistryRow>> {
        let conn = self.lock_conn()?;
        get_registry_row(&conn, table_id)
    }
}

fn get_registry_row(conn: &Connection, table_id: &str) -> Result<Option<RegistryRow>> {
    let row = conn
        .query_row(
            "SELECT sql_table_name, table_name, structure, field_mapping
             FROM cache_table_registry WHERE table_id = ?1",
            params![table_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((sql_table_name, table_name, structure_json, mapping_json)) = row else {
        return Ok(None);
    };

    let structure: TableDescriptor = serde_json::from_str(&structure_json)?;
    let field_mapping: FieldMapping = serde_json::from_str(&mapping_json)?;

    Ok(Some(RegistryRow {
        table_id: table_id.to_string(),
        sql_table_name,
        table_name,
        structure,
        field_mapping,
    }))
}

/// Derives the `(column_name, column_type)` sequence for one field, folding
/// duplicate labels via `dedupe_column_names` over the *stem* first so two
/// fields named identically don't collide before type-specific suffixes are
/// appended.
fn columns_for_field(field: &FieldDescriptor, label: &str) -> SlugColumns {
    field
        .field_type
        .columns(label)
        .into_iter()
        .map(|c| (c.name, c.column_type))
        .collect()
}

fn build_field_mapping(fields: &[FieldDescriptor]) -> FieldMapping {
    let stems: Vec<String> = fields
        .iter()
        .map(|f| {
            if f.label.trim().is_empty() {
                sanitize_identifier(&f.slug)
            } else {
                sanitize_identifier(&f.label)
            }
        })
        .collect();
    let stems = dedupe_column_names(&stems);

    let mut mapping = FieldMapping::new();
    for (field, stem) in fields.iter().zip(stems.iter()) {
        mapping.0.insert(field.slug.clone(), columns_for_field(field, stem));
    }
    mapping
}

fn index_statements(sql_table_name: &str, fields: &[FieldDescriptor], mapping: &FieldMapping) -> Vec<String> {
    let mut stmts = Vec::new();
    for col in ALWAYS_INDEXED {
        stmts.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{sql_table_name}_{col} ON {sql_table_name}({col})"
        ));
    }
    for field in fields {
        let Some(cols) = mapping.0.get(&field.slug) else {
            continue;
        };
        let stem = crate::codec::recover_stem(field.field_type, cols, &field.slug);
        for idx_col in field.field_type.index_columns(&stem) {
            stmts.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{sql_table_name}_{idx_col} ON {sql_table_name}({idx_col})"
            ));
        }
        if field.params.primary {
            let principal = field.field_type.principal_column(&stem, None);
            stmts.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{sql_table_name}_{principal}_primary ON {sql_table_name}({principal})"
            ));
        }
    }
    stmts
}

fn create_table(conn: &Connection, structure: &TableDescriptor) -> Result<String> {
    let sql_table_name = physical_table_name(&structure.name, &structure.table_id);
    let mapping = build_field_mapping(&structure.fields);

    let mut column_defs = vec![
        "id TEXT PRIMARY KEY".to_string(),
        "cached_at TEXT NOT NULL".to_string(),
        "expires_at TEXT NOT NULL".to_string(),
    ];
    for cols in mapping.0.values() {
        for (name, col_type) in cols {
            column_defs.push(format!("{name} {}", col_type.sql_type()));
        }
    }

    let ddl = format!("CREATE TABLE IF NOT EXISTS {sql_table_name} ({})", column_defs.join(", "));
    conn.execute_batch(&ddl).map_err(|e| StorageError::Evolution {
        table_id: structure.table_id.clone(),
        reason: format!("create table failed: {e}"),
    })?;

    for stmt in index_statements(&sql_table_name, &structure.fields, &mapping) {
        conn.execute_batch(&stmt).map_err(|e| StorageError::Evolution {
            table_id: structure.table_id.clone(),
            reason: format!("index creation failed: {e}"),
        })?;
    }

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO cache_table_registry
            (table_id, sql_table_name, table_name, structure, field_mapping, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            structure.table_id,
            sql_table_name,
            structure.name,
            serde_json::to_string(structure)?,
            serde_json::to_string(&mapping)?,
            now,
        ],
    )?;

    info!(table_id = %structure.table_id, sql_table_name, "created physical table and registry row");
    Ok(sql_table_name)
}

/// Additive evolution only (spec.md §4.1/§9 Open Question #2): fields
/// removed upstream keep their columns. Either every new column is added
/// and the registry row updated, or neither (spec.md §4.1 Failure clause).
fn evolve_table(conn: &Connection, existing: &RegistryRow, incoming: &TableDescriptor) -> Result<String> {
    let existing_slugs: std::collections::HashSet<&str> =
        existing.structure.fields.iter().map(|f| f.slug.as_str()).collect();
    let added: Vec<&FieldDescriptor> = incoming
        .fields
        .iter()
        .filter(|f| !existing_slugs.contains(f.slug.as_str()))
        .collect();

    if added.is_empty() {
        // Re-persist the incoming structure in case labels/params changed,
        // but the physical columns and mapping are untouched.
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE cache_table_registry SET structure = ?1, updated_at = ?2 WHERE table_id = ?3",
            params![serde_json::to_string(incoming)?, now, existing.table_id],
        )?;
        return Ok(existing.sql_table_name.clone());
    }

    let mut mapping = existing.field_mapping.clone();
    let existing_stems: std::collections::HashSet<String> = mapping
        .0
        .values()
        .flat_map(|cols| cols.iter().map(|(name, _)| name.clone()))
        .collect();

    let mut new_stems: Vec<String> = added
        .iter()
        .map(|f| {
            if f.label.trim().is_empty() {
                sanitize_identifier(&f.slug)
            } else {
                sanitize_identifier(&f.label)
            }
        })
        .collect();
    // Dedupe against both each other and already-present stems.
    let mut seen = existing_stems;
    for stem in new_stems.iter_mut() {
        let mut candidate = stem.clone();
        let mut suffix = 2;
        while seen.contains(&candidate) {
            candidate = format!("{stem}_{suffix}");
            suffix += 1;
        }
        seen.insert(candidate.clone());
        *stem = candidate;
    }

    let mut new_columns: HashMap<String, SlugColumns> = HashMap::new();
    for (field, stem) in added.iter().zip(new_stems.iter()) {
        new_columns.insert(field.slug.clone(), columns_for_field(field, stem));
    }

    for cols in new_columns.values() {
        for (name, col_type) in cols {
            let ddl = format!(
                "ALTER TABLE {} ADD COLUMN {name} {}",
                existing.sql_table_name,
                col_type.sql_type()
            );
            conn.execute_batch(&ddl).map_err(|e| StorageError::Evolution {
                table_id: existing.table_id.clone(),
                reason: format!("add column {name} failed: {e}"),
            })?;
        }
    }

    for (field, stem) in added.iter().zip(new_stems.iter()) {
        for idx_col in field.field_type.index_columns(stem) {
            let stmt = format!(
                "CREATE INDEX IF NOT EXISTS idx_{}_{idx_col} ON {}({idx_col})",
                existing.sql_table_name, existing.sql_table_name
            );
            conn.execute_batch(&stmt).map_err(|e| StorageError::Evolution {
                table_id: existing.table_id.clone(),
                reason: format!("index creation for added column failed: {e}"),
            })?;
        }
    }

    mapping.0.extend(new_columns);

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE cache_table_registry
         SET structure = ?1, field_mapping = ?2, updated_at = ?3
         WHERE table_id = ?4",
        params![
            serde_json::to_string(incoming)?,
            serde_json::to_string(&mapping)?,
            now,
            existing.table_id,
        ],
    )?;

    for field in &added {
        info!(table_id = %existing.table_id, slug = %field.slug, "added column for evolved field");
    }

    Ok(existing.sql_table_name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_core::{field::FieldParams, FieldType};

    fn field(slug: &str, label: &str, field_type: FieldType) -> FieldDescriptor {
        FieldDescriptor {
            slug: slug.to_string(),
            label: label.to_string(),
            field_type,
            params: FieldParams::default(),
        }
    }

    fn sample_structure() -> TableDescriptor {
        TableDescriptor {
            table_id: "tbl_1".to_string(),
            name: "My Table".to_string(),
            fields: vec![
                field("f_title", "Title", FieldType::Text),
                field("f_status", "Status", FieldType::Status),
                field("f_due", "Due", FieldType::DueDate),
                field("f_assigned", "Assigned To", FieldType::AssignedTo),
            ],
        }
    }

    #[test]
    fn ensure_creates_table_with_expected_columns() {
        let store = SqliteStore::open_in_memory().unwrap();
        let structure = sample_structure();
        let sql_name = store.ensure_table(&structure).unwrap();
        assert_eq!(sql_name, "cache_records_my_table_tbl_1");

        let conn = store.lock_conn().unwrap();
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({sql_name})")).unwrap();
        let cols: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for expected in [
            "id",
            "cached_at",
            "expires_at",
            "status",
            "status_updated_on",
            "due_from",
            "due_to",
            "due_from_include_time",
            "due_to_include_time",
            "due_is_overdue",
            "due_is_completed",
            "assigned_to",
        ] {
            assert!(cols.contains(&expected.to_string()), "missing column {expected}: {cols:?}");
        }
    }

    #[test]
    fn ensure_evolution_adds_column_without_touching_existing() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut structure = sample_structure();
        store.ensure_table(&structure).unwrap();

        structure.fields.push(field("f_priority", "Priority", FieldType::Number));
        let sql_name = store.ensure_table(&structure).unwrap();

        let conn = store.lock_conn().unwrap();
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({sql_name})")).unwrap();
        let cols: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        assert!(cols.contains(&"priority".to_string()));
    }

    #[test]
    fn field_mapping_keys_equal_slug_set() {
        let store = SqliteStore::open_in_memory().unwrap();
        let structure = sample_structure();
        store.ensure_table(&structure).unwrap();
        let row = store.get_registry("tbl_1").unwrap().unwrap();

        let slugs: std::collections::HashSet<&str> = structure.fields.iter().map(|f| f.slug.as_str()).collect();
        let mapping_keys: std::collections::HashSet<&str> = row.field_mapping.0.keys().map(|s| s.as_str()).collect();
        assert_eq!(slugs, mapping_keys);
    }
}
