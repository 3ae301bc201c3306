//! Invalidation Coordinator (F, spec.md §4.6). The cascade rules are
//! expressed as a pure function from an event to a sequence of actions,
//! executed sequentially by [`SqliteStore::apply_invalidation`] -- no
//! component recurses into another.

use crate::error::Result;
use crate::sqlite::SqliteStore;

/// Something that happened and may require cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    /// A table's field catalogue changed (add/bulk-add/update/delete field).
    TableStructureChanged { table_id: String },
    /// A table's records were bulk-replaced or otherwise need a full
    /// table-cache invalidation without a structure change.
    TableRecordsInvalidated { table_id: String },
    /// The table list for a solution (or all solutions) should be
    /// refreshed.
    TableListInvalidated { solution_id: Option<String> },
    /// The solutions cache itself should be refreshed.
    SolutionsInvalidated,
}

/// One concrete invalidation step, in the order it must run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationAction {
    InvalidateTableRecords { table_id: String },
    InvalidateTableList { solution_id: Option<String> },
    InvalidateSolutions,
}

/// Pure cascade: (event) -> (ordered actions). spec.md §4.6 rules:
/// - structure change on a table invalidates that table's records, then its
///   table-list row (it is a `structure_changed` invalidate_table).
/// - a table-list invalidation first invalidates every table's record cache
///   in scope, then the table-list rows.
/// - a solutions invalidation cascades through table-list invalidation
///   first.
pub fn cascade(event: InvalidationEvent, known_table_ids: &[String]) -> Vec<InvalidationAction> {
    match event {
        InvalidationEvent::TableStructureChanged { table_id } => vec![
            InvalidationAction::InvalidateTableRecords { table_id: table_id.clone() },
            InvalidationAction::InvalidateTableList { solution_id: None },
        ],
        InvalidationEvent::TableRecordsInvalidated { table_id } => {
            vec![InvalidationAction::InvalidateTableRecords { table_id }]
        }
        InvalidationEvent::TableListInvalidated { solution_id } => {
            let mut actions: Vec<InvalidationAction> = known_table_ids
                .iter()
                .map(|id| InvalidationAction::InvalidateTableRecords { table_id: id.clone() })
                .collect();
            actions.push(InvalidationAction::InvalidateTableList { solution_id });
            actions
        }
        InvalidationEvent::SolutionsInvalidated => {
            let mut actions: Vec<InvalidationAction> = known_table_ids
                .iter()
                .map(|id| InvalidationAction::InvalidateTableRecords { table_id: id.clone() })
                .collect();
            actions.push(InvalidationAction::InvalidateTableList { solution_id: None });
            actions.push(InvalidationAction::InvalidateSolutions);
            actions
        }
    }
}

impl SqliteStore {
    /// Runs the cascade for `event` against this store, sequentially.
    pub fn apply_invalidation(&self, event: InvalidationEvent) -> Result<()> {
        let table_ids = self.known_table_ids_for_event(&event)?;
        for action in cascade(event, &table_ids) {
            self.execute_invalidation_action(action)?;
        }
        Ok(())
    }

    fn known_table_ids_for_event(&self, event: &InvalidationEvent) -> Result<Vec<String>> {
        match event {
            InvalidationEvent::TableListInvalidated { solution_id } => {
                let tables = self.list_tables(solution_id.as_deref())?;
                Ok(tables.into_iter().map(|t| t.id).collect())
            }
            InvalidationEvent::SolutionsInvalidated => {
                let tables = self.list_tables(None)?;
                Ok(tables.into_iter().map(|t| t.id).collect())
            }
            InvalidationEvent::TableStructureChanged { .. } | InvalidationEvent::TableRecordsInvalidated { .. } => {
                Ok(Vec::new())
            }
        }
    }

    fn execute_invalidation_action(&self, action: InvalidationAction) -> Result<()> {
        match action {
            InvalidationAction::InvalidateTableRecords { table_id } => {
                if let Some(row) = self.get_registry(&table_id)? {
                    self.invalidate_records(&row.sql_table_name)?;
                }
                Ok(())
            }
            InvalidationAction::InvalidateTableList { solution_id } => self.invalidate_tables(solution_id.as_deref()),
            InvalidationAction::InvalidateSolutions => self.invalidate_solutions(),
        }
    }

    /// Sets every row's `expires_at` to the epoch in a dynamic records
    /// table, the mechanism `invalidate_table` uses (spec.md §4.6) to force
    /// a miss on next read without dropping rows outright.
    fn invalidate_records(&self, sql_table_name: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            &format!("UPDATE {sql_table_name} SET expires_at = '1970-01-01T00:00:00Z'"),
            [],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_change_invalidates_records_then_table_list() {
        let actions = cascade(
            InvalidationEvent::TableStructureChanged { table_id: "tbl_1".to_string() },
            &[],
        );
        assert_eq!(
            actions,
            vec![
                InvalidationAction::InvalidateTableRecords { table_id: "tbl_1".to_string() },
                InvalidationAction::InvalidateTableList { solution_id: None },
            ]
        );
    }

    #[test]
    fn table_list_invalidation_cascades_through_known_tables_first() {
        let actions = cascade(
            InvalidationEvent::TableListInvalidated { solution_id: Some("sol_1".to_string()) },
            &["tbl_1".to_string(), "tbl_2".to_string()],
        );
        assert_eq!(
            actions,
            vec![
                InvalidationAction::InvalidateTableRecords { table_id: "tbl_1".to_string() },
                InvalidationAction::InvalidateTableRecords { table_id: "tbl_2".to_string() },
                InvalidationAction::InvalidateTableList { solution_id: Some("sol_1".to_string()) },
            ]
        );
    }

    #[test]
    fn solutions_invalidation_cascades_through_table_list_first() {
        let actions = cascade(InvalidationEvent::SolutionsInvalidated, &["tbl_1".to_string()]);
        assert_eq!(
            actions,
            vec![
                InvalidationAction::InvalidateTableRecords { table_id: "tbl_1".to_string() },
                InvalidationAction::InvalidateTableList { solution_id: None },
                InvalidationAction::InvalidateSolutions,
            ]
        );
    }

    #[test]
    fn apply_invalidation_executes_against_a_real_table() {
        use cache_core::{FieldDescriptor, FieldParams, FieldType, TableDescriptor};

        let store = SqliteStore::open_in_memory().unwrap();
        let structure = TableDescriptor {
            table_id: "tbl_1".to_string(),
            name: "Tasks".to_string(),
            fields: vec![FieldDescriptor {
                slug: "title".to_string(),
                label: "Title".to_string(),
                field_type: FieldType::Text,
                params: FieldParams::default(),
            }],
        };
        store.ensure_table(&structure).unwrap();
        store
            .replace_all(
                &structure,
                &[crate::records::RawRecord {
                    id: "rec_1".to_string(),
                    fields: [("title".to_string(), serde_json::json!("hi"))].into_iter().collect(),
                }],
                3600,
            )
            .unwrap();
        assert!(store.table_valid("tbl_1").unwrap());

        store
            .apply_invalidation(InvalidationEvent::TableRecordsInvalidated { table_id: "tbl_1".to_string() })
            .unwrap();

        assert!(!store.table_valid("tbl_1").unwrap());
    }
}
