//! Filter Translator (H, spec.md §4.8): turns the portable filter-tree AST
//! into one compiled SQL fragment, recursing through nested AND/OR groups.

use rusqlite::types::ToSql;

use cache_core::filter::{FilterNode, LogicalOp};
use cache_core::TimezoneConfig;
use cache_storage::RegistryRow;

use crate::compile::{compile_condition, Compiled};
use crate::error::Result;

/// Recursively compiles a filter-tree node into one parenthesised SQL
/// boolean expression plus its bound params, in source order.
pub fn translate(registry: &RegistryRow, node: &FilterNode, tz: &TimezoneConfig) -> Result<Compiled> {
    match node {
        FilterNode::Condition(cond) => compile_condition(registry, &cond.field, cond.comparison, &cond.value, tz),
        FilterNode::Group(group) => translate_group(registry, group.op, &group.nodes, tz),
    }
}

fn translate_group(registry: &RegistryRow, op: LogicalOp, nodes: &[FilterNode], tz: &TimezoneConfig) -> Result<Compiled> {
    if nodes.is_empty() {
        // An empty group is vacuously true for AND, vacuously false for OR.
        let sql = match op {
            LogicalOp::And => "1".to_string(),
            LogicalOp::Or => "0".to_string(),
        };
        return Ok(Compiled { sql, params: Vec::new() });
    }

    let mut clauses = Vec::with_capacity(nodes.len());
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    for child in nodes {
        let compiled = translate(registry, child, tz)?;
        clauses.push(compiled.sql);
        params.extend(compiled.params);
    }
    let sql = format!("({})", clauses.join(op.sql_joiner()));
    Ok(Compiled { sql, params })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_core::field::FieldParams;
    use cache_core::table::FieldMapping;
    use cache_core::{FieldDescriptor, FieldType, TableDescriptor};
    use cache_core::FilterGroup;
    use serde_json::json;

    fn registry() -> RegistryRow {
        let fields = vec![
            FieldDescriptor {
                slug: "status".to_string(),
                label: "Status".to_string(),
                field_type: FieldType::Status,
                params: FieldParams::default(),
            },
            FieldDescriptor {
                slug: "priority".to_string(),
                label: "Priority".to_string(),
                field_type: FieldType::Number,
                params: FieldParams::default(),
            },
        ];
        let structure = TableDescriptor { table_id: "tbl_1".to_string(), name: "Tasks".to_string(), fields };
        let mut mapping = FieldMapping::new();
        mapping.0.insert(
            "status".to_string(),
            FieldType::Status.columns("status").into_iter().map(|c| (c.name, c.column_type)).collect(),
        );
        mapping.0.insert(
            "priority".to_string(),
            FieldType::Number.columns("priority").into_iter().map(|c| (c.name, c.column_type)).collect(),
        );
        RegistryRow {
            table_id: "tbl_1".to_string(),
            sql_table_name: "cache_records_tasks_tbl_1".to_string(),
            table_name: "Tasks".to_string(),
            structure,
            field_mapping: mapping,
        }
    }

    #[test]
    fn nested_group_produces_balanced_parens() {
        let tree = json!({
            "operator": "and",
            "fields": [
                {"field": "status", "comparison": "eq", "value": "open"},
                {
                    "operator": "or",
                    "fields": [
                        {"field": "priority", "comparison": "gt", "value": 2},
                        {"field": "priority", "comparison": "eq", "value": 0}
                    ]
                }
            ]
        });
        let node = FilterGroup::parse(&tree).unwrap();
        let compiled = translate(&registry(), &node, &TimezoneConfig::Utc).unwrap();
        assert_eq!(compiled.sql.matches('(').count(), compiled.sql.matches(')').count());
        assert!(compiled.sql.contains(" AND "));
        assert!(compiled.sql.contains(" OR "));
        assert_eq!(compiled.params.len(), 3);
    }

    #[test]
    fn single_leaf_condition_has_no_wrapping_group_parens() {
        let tree = json!({"field": "status", "comparison": "eq", "value": "open"});
        let node = FilterGroup::parse(&tree).unwrap();
        let compiled = translate(&registry(), &node, &TimezoneConfig::Utc).unwrap();
        assert_eq!(compiled.sql, "status = ?");
    }

    #[test]
    fn empty_or_group_is_vacuously_false() {
        let node = FilterNode::Group(cache_core::FilterGroup {
            op: cache_core::LogicalOp::Or,
            nodes: Vec::new(),
        });
        let compiled = translate(&registry(), &node, &TimezoneConfig::Utc).unwrap();
        assert_eq!(compiled.sql, "0");
    }
}
