//! Operator→SQL compilation with type-aware branching (spec.md §4.4).

use chrono::NaiveDate;
use rusqlite::types::ToSql;
use serde_json::Value as Json;

use cache_core::filter::FilterValue;
use cache_core::{FieldType, Operator, TimezoneConfig};
use cache_storage::registry::RegistryRow;

use crate::error::{QueryError, Result};

/// One compiled condition: a SQL fragment with `?`-free placeholders (the
/// caller renumbers them into the overall statement) and its bound params,
/// in the order the `?`s appear.
pub struct Compiled {
    pub sql: String,
    pub params: Vec<Box<dyn ToSql>>,
}

/// Resolves `slug` (optionally dotted with a sub-field, e.g. `"due.from_date"`)
/// against `registry`'s field catalogue and mapping, returning the principal
/// column to filter/sort on. The built-in `id` field bypasses the catalogue
/// entirely (spec.md §4.4).
pub fn resolve_principal_column(registry: &RegistryRow, slug_path: &str) -> Result<(String, Option<FieldType>)> {
    if slug_path == "id" {
        return Ok(("id".to_string(), None));
    }

    let (slug, sub_field) = match slug_path.split_once('.') {
        Some((s, sub)) => (s, Some(sub)),
        None => (slug_path, None),
    };

    let field = registry
        .structure
        .field(slug)
        .ok_or_else(|| QueryError::UnknownField {
            table_id: registry.table_id.clone(),
            slug: slug.to_string(),
        })?;
    let cols = registry.field_mapping.0.get(slug).ok_or_else(|| QueryError::UnknownField {
        table_id: registry.table_id.clone(),
        slug: slug.to_string(),
    })?;
    let stem = cache_storage::codec::recover_stem(field.field_type, cols, slug);
    let column = field.field_type.principal_column(&stem, sub_field);
    Ok((column, Some(field.field_type)))
}

/// Compiles one leaf condition into a SQL boolean expression plus its bound
/// parameters (spec.md §4.4's operator semantics table).
pub fn compile_condition(
    registry: &RegistryRow,
    slug_path: &str,
    op: Operator,
    value: &FilterValue,
    tz: &TimezoneConfig,
) -> Result<Compiled> {
    let (column, field_type) = resolve_principal_column(registry, slug_path)?;
    let is_json_array = field_type.is_some_and(FieldType::is_json_array);
    let is_text = field_type.is_some_and(FieldType::is_text) || field_type.is_none();

    match op {
        Operator::Eq => compile_eq_like(&column, field_type, value, tz, false),
        Operator::Ne => compile_eq_like(&column, field_type, value, tz, true),
        Operator::Gt => compile_cmp(&column, ">", value),
        Operator::Gte => compile_cmp(&column, ">=", value),
        Operator::Lt => compile_cmp(&column, "<", value),
        Operator::Lte => compile_cmp(&column, "<=", value),
        Operator::Contains => compile_like(&column, scalar_str(value)?, LikeShape::Contains),
        Operator::StartsWith => compile_like(&column, scalar_str(value)?, LikeShape::StartsWith),
        Operator::EndsWith => compile_like(&column, scalar_str(value)?, LikeShape::EndsWith),
        Operator::In => compile_in(&column, value, false),
        Operator::NotIn => compile_in(&column, value, true),
        Operator::Between => compile_between(&column, value, field_type, tz, false),
        Operator::NotBetween => compile_between(&column, value, field_type, tz, true),
        Operator::IsNull => Ok(Compiled { sql: format!("{column} IS NULL"), params: Vec::new() }),
        Operator::IsNotNull => Ok(Compiled { sql: format!("{column} IS NOT NULL"), params: Vec::new() }),
        Operator::IsEmpty => Ok(compile_is_empty(&column, is_json_array, is_text, false)),
        Operator::IsNotEmpty => Ok(compile_is_empty(&column, is_json_array, is_text, true)),
        Operator::HasAnyOf => compile_has(&column, value, HasMode::Any),
        Operator::HasAllOf => compile_has(&column, value, HasMode::All),
        Operator::HasNoneOf => compile_has(&column, value, HasMode::None),
        Operator::IsExactly => compile_is_exactly(&column, value),
        Operator::IsBefore => compile_date_cmp(&column, DateBoundary::Start, "<", value, field_type, tz),
        Operator::IsAfter => compile_date_cmp(&column, DateBoundary::End, ">=", value, field_type, tz),
        Operator::IsOnOrBefore => compile_date_cmp(&column, DateBoundary::End, "<", value, field_type, tz),
        Operator::IsOnOrAfter => compile_date_cmp(&column, DateBoundary::Start, ">=", value, field_type, tz),
        Operator::IsOverdue => compile_overdue(slug_path, registry, true),
        Operator::IsNotOverdue => compile_overdue(slug_path, registry, false),
        Operator::FileNameContains => compile_like(&column, format!("\"name\":\"{}", scalar_str(value)?), LikeShape::Contains),
        Operator::FileTypeIs => compile_like(&column, format!("\"type\":\"{}\"", scalar_str(value)?), LikeShape::Contains),
    }
}

/// Which side of a local calendar day a date-comparison operator anchors to:
/// `is_before`/`is_on_or_after` anchor to the day's start, `is_after`/
/// `is_on_or_before` anchor to its end (the start of the next day).
enum DateBoundary {
    Start,
    End,
}

enum LikeShape {
    Contains,
    StartsWith,
    EndsWith,
}

enum HasMode {
    Any,
    All,
    None,
}

fn scalar_str(value: &FilterValue) -> Result<String> {
    match value {
        FilterValue::Scalar(Json::String(s)) => Ok(s.clone()),
        FilterValue::Scalar(other) => Ok(other.to_string()),
        FilterValue::Null => Ok(String::new()),
    }
}

fn scalar_array(value: &FilterValue) -> Result<Vec<Json>> {
    match value {
        FilterValue::Scalar(Json::Array(items)) => Ok(items.clone()),
        other => Err(QueryError::InvalidValue {
            field: String::new(),
            operator: "array-valued".to_string(),
            message: format!("expected a JSON array, got {other:?}"),
        }),
    }
}

/// Escapes `%`, `_`, and the escape character itself for a `LIKE … ESCAPE '\'`
/// pattern.
fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn compile_like(column: &str, needle: String, shape: LikeShape) -> Result<Compiled> {
    let escaped = escape_like(&needle);
    let pattern = match shape {
        LikeShape::Contains => format!("%{escaped}%"),
        LikeShape::StartsWith => format!("{escaped}%"),
        LikeShape::EndsWith => format!("%{escaped}"),
    };
    Ok(Compiled {
        sql: format!("{column} LIKE ? ESCAPE '\\'"),
        params: vec![Box::new(pattern)],
    })
}

fn json_scalar_param(value: &Json) -> Box<dyn ToSql> {
    match value {
        Json::String(s) => Box::new(s.clone()),
        Json::Number(n) if n.is_i64() => Box::new(n.as_i64().unwrap()),
        Json::Number(n) => Box::new(n.as_f64().unwrap_or(0.0)),
        Json::Bool(b) => Box::new(if *b { 1i64 } else { 0i64 }),
        Json::Null => Box::new(Option::<String>::None),
        other => Box::new(other.to_string()),
    }
}

fn compile_cmp(column: &str, sym: &str, value: &FilterValue) -> Result<Compiled> {
    let json = match value {
        FilterValue::Scalar(v) => v,
        FilterValue::Null => &Json::Null,
    };
    Ok(Compiled {
        sql: format!("{column} {sym} ?"),
        params: vec![json_scalar_param(json)],
    })
}

/// `eq`/`ne` on a date-bearing principal column expand a date-only value to
/// the caller's local calendar day (spec.md §4.4); everything else is a
/// direct comparison.
fn compile_eq_like(
    column: &str,
    field_type: Option<FieldType>,
    value: &FilterValue,
    tz: &TimezoneConfig,
    negate: bool,
) -> Result<Compiled> {
    if let Some(date) = date_bearing_scalar(field_type, value) {
        let (start, end) = tz.local_day_bounds_utc(date);
        let cmp = if negate {
            format!("({column} < ? OR {column} >= ?)")
        } else {
            format!("{column} >= ? AND {column} < ?")
        };
        return Ok(Compiled {
            sql: cmp,
            params: vec![Box::new(start.to_rfc3339()), Box::new(end.to_rfc3339())],
        });
    }
    let sym = if negate { "!=" } else { "=" };
    compile_cmp(column, sym, value)
}

/// `is_before`/`is_after`/`is_on_or_before`/`is_on_or_after`: a date-only
/// value becomes a local-day boundary instant per spec.md §4.4, instead of a
/// bare string comparison that would silently exclude part of the caller's
/// day. `is_before`/`is_on_or_after` anchor to the day's start; `is_after`/
/// `is_on_or_before` anchor to its end (the next day's start).
fn compile_date_cmp(
    column: &str,
    boundary: DateBoundary,
    sym: &str,
    value: &FilterValue,
    field_type: Option<FieldType>,
    tz: &TimezoneConfig,
) -> Result<Compiled> {
    if let Some(date) = date_bearing_scalar(field_type, value) {
        let (start, end) = tz.local_day_bounds_utc(date);
        let bound = match boundary {
            DateBoundary::Start => start,
            DateBoundary::End => end,
        };
        return Ok(Compiled {
            sql: format!("{column} {sym} ?"),
            params: vec![Box::new(bound.to_rfc3339())],
        });
    }
    compile_cmp(column, sym, value)
}

fn date_bearing_scalar(field_type: Option<FieldType>, value: &FilterValue) -> Option<NaiveDate> {
    let is_date_bearing = matches!(field_type, Some(FieldType::Date) | Some(FieldType::DateRange) | Some(FieldType::DueDate));
    if !is_date_bearing {
        return None;
    }
    let FilterValue::Scalar(Json::String(s)) = value else {
        return None;
    };
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn compile_in(column: &str, value: &FilterValue, negate: bool) -> Result<Compiled> {
    let items = scalar_array(value)?;
    let placeholders = vec!["?"; items.len()].join(", ");
    let kw = if negate { "NOT IN" } else { "IN" };
    Ok(Compiled {
        sql: format!("{column} {kw} ({placeholders})"),
        params: items.iter().map(json_scalar_param).collect(),
    })
}

fn compile_between(column: &str, value: &FilterValue, field_type: Option<FieldType>, tz: &TimezoneConfig, negate: bool) -> Result<Compiled> {
    let items = scalar_array(value)?;
    if items.len() != 2 {
        return Err(QueryError::InvalidValue {
            field: column.to_string(),
            operator: "between".to_string(),
            message: "expected a two-element [min, max] array".to_string(),
        });
    }
    let (min, max) = (&items[0], &items[1]);
    let resolve = |v: &Json, end: bool| -> (Box<dyn ToSql>,) {
        if let (Some(FieldType::Date) | Some(FieldType::DateRange) | Some(FieldType::DueDate), Json::String(s)) = (field_type, v) {
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                let (start, bound_end) = tz.local_day_bounds_utc(date);
                let chosen = if end { bound_end } else { start };
                return (Box::new(chosen.to_rfc3339()),);
            }
        }
        (json_scalar_param(v),)
    };
    let (min_param,) = resolve(min, false);
    let (max_param,) = resolve(max, true);
    let sql = if negate {
        format!("({column} < ? OR {column} > ?)")
    } else {
        format!("{column} BETWEEN ? AND ?")
    };
    Ok(Compiled { sql, params: vec![min_param, max_param] })
}

fn compile_is_empty(column: &str, is_json_array: bool, is_text: bool, negate: bool) -> Compiled {
    let positive = if is_json_array {
        format!("({column} IS NULL OR {column} = '[]')")
    } else if is_text {
        format!("({column} IS NULL OR {column} = '')")
    } else {
        format!("{column} IS NULL")
    };
    let sql = if negate { format!("NOT ({positive})") } else { positive };
    Compiled { sql, params: Vec::new() }
}

fn compile_has(column: &str, value: &FilterValue, mode: HasMode) -> Result<Compiled> {
    let items = scalar_array(value)?;
    if items.is_empty() {
        // Vacuously: has_any_of([]) is false, has_all_of([]) is true, has_none_of([]) is true.
        let sql = match mode {
            HasMode::Any => "0".to_string(),
            HasMode::All | HasMode::None => "1".to_string(),
        };
        return Ok(Compiled { sql, params: Vec::new() });
    }
    let mut clauses = Vec::with_capacity(items.len());
    let mut params: Vec<Box<dyn ToSql>> = Vec::with_capacity(items.len());
    for item in &items {
        let needle = match item {
            Json::String(s) => s.clone(),
            other => other.to_string(),
        };
        clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
        params.push(Box::new(format!("%\"{}\"%", escape_like(&needle))));
    }
    let sql = match mode {
        HasMode::Any => format!("({})", clauses.join(" OR ")),
        HasMode::All => format!("({})", clauses.join(" AND ")),
        HasMode::None => format!("NOT ({})", clauses.join(" OR ")),
    };
    Ok(Compiled { sql, params })
}

fn compile_is_exactly(column: &str, value: &FilterValue) -> Result<Compiled> {
    let items = scalar_array(value)?;
    let mut clauses = vec![format!("json_array_length({column}) = ?")];
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(items.len() as i64)];
    for item in &items {
        let needle = match item {
            Json::String(s) => s.clone(),
            other => other.to_string(),
        };
        clauses.push(format!("{column} LIKE ? ESCAPE '\\'"));
        params.push(Box::new(format!("%\"{}\"%", escape_like(&needle))));
    }
    Ok(Compiled { sql: format!("({})", clauses.join(" AND ")), params })
}

/// `is_overdue`/`is_not_overdue` only apply to due-date fields and read the
/// stored flag column rather than recomputing it (spec.md §9 Open Question:
/// the flag is reflected as stored, never recomputed implicitly).
fn compile_overdue(slug_path: &str, registry: &RegistryRow, overdue: bool) -> Result<Compiled> {
    let slug = slug_path.split('.').next().unwrap_or(slug_path);
    let field = registry.structure.field(slug).ok_or_else(|| QueryError::UnknownField {
        table_id: registry.table_id.clone(),
        slug: slug.to_string(),
    })?;
    if field.field_type != FieldType::DueDate {
        return Err(QueryError::InvalidValue {
            field: slug.to_string(),
            operator: if overdue { "is_overdue" } else { "is_not_overdue" }.to_string(),
            message: "is_overdue/is_not_overdue only apply to due-date fields".to_string(),
        });
    }
    let cols = registry.field_mapping.0.get(slug).ok_or_else(|| QueryError::UnknownField {
        table_id: registry.table_id.clone(),
        slug: slug.to_string(),
    })?;
    let stem = cache_storage::codec::recover_stem(field.field_type, cols, slug);
    let flag_col = format!("{stem}_is_overdue");
    let sql = if overdue { format!("{flag_col} = 1") } else { format!("({flag_col} IS NULL OR {flag_col} = 0)") };
    Ok(Compiled { sql, params: Vec::new() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_core::{field::FieldParams, table::FieldMapping, FieldDescriptor, TableDescriptor};
    use serde_json::json;

    fn registry() -> RegistryRow {
        let fields = vec![
            FieldDescriptor {
                slug: "due".to_string(),
                label: "Due".to_string(),
                field_type: FieldType::DueDate,
                params: FieldParams::default(),
            },
            FieldDescriptor {
                slug: "assignees".to_string(),
                label: "Assignees".to_string(),
                field_type: FieldType::AssignedTo,
                params: FieldParams::default(),
            },
        ];
        let structure = TableDescriptor { table_id: "tbl_1".to_string(), name: "Tasks".to_string(), fields };
        let mut mapping = FieldMapping::new();
        mapping.0.insert(
            "due".to_string(),
            cache_core::FieldType::DueDate.columns("due").into_iter().map(|c| (c.name, c.column_type)).collect(),
        );
        mapping.0.insert(
            "assignees".to_string(),
            cache_core::FieldType::AssignedTo.columns("assignees").into_iter().map(|c| (c.name, c.column_type)).collect(),
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
    fn due_date_defaults_to_to_column() {
        let (col, _) = resolve_principal_column(&registry(), "due").unwrap();
        assert_eq!(col, "due_to");
    }

    #[test]
    fn sub_field_addressing_selects_from_column() {
        let (col, _) = resolve_principal_column(&registry(), "due.from_date").unwrap();
        assert_eq!(col, "due_from");
    }

    #[test]
    fn id_bypasses_field_catalogue() {
        let (col, ft) = resolve_principal_column(&registry(), "id").unwrap();
        assert_eq!(col, "id");
        assert!(ft.is_none());
    }

    #[test]
    fn eq_on_date_only_value_expands_to_range() {
        let tz = TimezoneConfig::Utc;
        let compiled = compile_condition(
            &registry(),
            "due",
            Operator::Eq,
            &FilterValue::Scalar(json!("2026-06-15")),
            &tz,
        )
        .unwrap();
        assert!(compiled.sql.contains(">="));
        assert_eq!(compiled.params.len(), 2);
    }

    #[test]
    fn is_empty_on_json_array_field_checks_literal_empty_array() {
        let compiled = compile_condition(&registry(), "assignees", Operator::IsEmpty, &FilterValue::Null, &TimezoneConfig::Utc).unwrap();
        assert!(compiled.sql.contains("'[]'"));
    }

    #[test]
    fn has_any_of_ors_like_clauses() {
        let compiled = compile_condition(
            &registry(),
            "assignees",
            Operator::HasAnyOf,
            &FilterValue::Scalar(json!(["u1", "u2"])),
            &TimezoneConfig::Utc,
        )
        .unwrap();
        assert!(compiled.sql.contains(" OR "));
        assert_eq!(compiled.params.len(), 2);
    }

    #[test]
    fn is_overdue_reads_stored_flag() {
        let compiled = compile_condition(&registry(), "due", Operator::IsOverdue, &FilterValue::Null, &TimezoneConfig::Utc).unwrap();
        assert_eq!(compiled.sql, "due_is_overdue = 1");
    }
}
