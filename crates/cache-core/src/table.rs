//! Table descriptors and the sanitisation rules the Schema Registry uses to
//! derive physical names from upstream names (spec.md §3, §4.1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::field::{ColumnType, FieldDescriptor};

/// An upstream table's field catalogue, as seen by the Schema Registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_id: String,
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl TableDescriptor {
    pub fn field(&self, slug: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.slug == slug)
    }
}

/// The column-name → column-type mapping for one field slug, in the order
/// the Field Codec emitted them. Reassembly (spec.md §4.2) walks this back
/// to front.
pub type SlugColumns = Vec<(String, ColumnType)>;

/// `field_mapping`: slug → ordered column mapping, persisted as the
/// registry row's opaque blob (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping(pub HashMap<String, SlugColumns>);

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// All physical column names across every field, used to verify the
    /// "mapping keys equal slug set, column union equals physical columns"
    /// invariant from spec.md §8.
    pub fn all_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self
            .0
            .values()
            .flat_map(|cols| cols.iter().map(|(name, _)| name.clone()))
            .collect();
        cols.sort();
        cols.dedup();
        cols
    }
}

/// SQLite reserved words the Schema Registry must not emit as bare
/// identifiers (a non-exhaustive but practically sufficient list).
const RESERVED_WORDS: &[&str] = &[
    "select", "insert", "update", "delete", "from", "where", "table", "index", "order", "group",
    "by", "join", "primary", "key", "default", "null", "and", "or", "not", "values", "into",
    "create", "drop", "alter", "column", "references", "check", "unique", "limit", "offset",
    "union", "all", "as", "on", "set",
];

/// Sanitises an arbitrary upstream name into a `[A-Za-z0-9_]` SQL
/// identifier: lower-cased, non-alphanumerics folded to `_`, collapsed
/// repeats, digit-prefix guarded, reserved-word guarded (spec.md §4.1).
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_underscore = false;
    for ch in raw.chars() {
        let folded = ch.to_ascii_lowercase();
        if folded.is_ascii_alphanumeric() {
            out.push(folded);
            last_was_underscore = false;
        } else if !last_was_underscore {
            out.push('_');
            last_was_underscore = true;
        }
    }
    let trimmed = out.trim_matches('_');
    let mut result = if trimmed.is_empty() {
        "field".to_string()
    } else {
        trimmed.to_string()
    };

    if result.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        result = format!("t_{result}");
    }
    if RESERVED_WORDS.contains(&result.as_str()) {
        result = format!("{result}_col");
    }
    result
}

/// Builds the physical table name `cache_records_{sanitised_name}_{sanitised_id}`
/// from spec.md §3.
pub fn physical_table_name(table_name: &str, table_id: &str) -> String {
    format!(
        "cache_records_{}_{}",
        sanitize_identifier(table_name),
        sanitize_identifier(table_id)
    )
}

/// Deduplicates column names within a single table by appending `_2`, `_3`,
/// … to later collisions (spec.md §4.1).
pub fn dedupe_column_names(names: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    names
        .iter()
        .map(|name| {
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name.clone()
            } else {
                format!("{name}_{count}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_folds_and_guards_digit_prefix() {
        assert_eq!(sanitize_identifier("Due Date!!"), "due_date");
        assert_eq!(sanitize_identifier("123abc"), "t_123abc");
    }

    #[test]
    fn sanitize_guards_reserved_words() {
        assert_eq!(sanitize_identifier("Select"), "select_col");
    }

    #[test]
    fn physical_table_name_matches_convention() {
        assert_eq!(
            physical_table_name("My Table", "tbl_123"),
            "cache_records_my_table_tbl_123"
        );
    }

    #[test]
    fn dedupe_appends_suffixes() {
        let names = vec!["status".to_string(), "status".to_string(), "status".to_string()];
        assert_eq!(
            dedupe_column_names(&names),
            vec!["status", "status_2", "status_3"]
        );
    }
}
