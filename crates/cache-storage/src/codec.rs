//! Field Codec (B, spec.md §4.2): encodes an upstream JSON field value into
//! one or more typed SQL columns, and reconstructs the upstream shape back
//! from stored columns.
//!
//! Dispatch is a `match` over `cache_core::FieldType` — a closed enum, not
//! an open trait-object hierarchy, per spec.md §9.

use std::collections::HashMap;

use serde_json::{json, Value};

use cache_core::{value::ColumnValue, FieldType};

/// Encodes `value` (the upstream JSON shape for one field) into the
/// `(column_name, value)` pairs the field type maps to, per the column
/// mapping table in spec.md §4.2.
pub fn encode_field(field_type: FieldType, stem: &str, value: &Value) -> HashMap<String, ColumnValue> {
    let mut out = HashMap::new();
    match field_type {
        FieldType::FirstCreated | FieldType::LastUpdated => {
            out.insert(format!("{stem}_on"), text(obj_str(value, "on").or_else(|| value.as_str())));
            out.insert(format!("{stem}_by"), text(obj_str(value, "by")));
        }
        FieldType::DeletedDate => {
            out.insert("deleted_on".to_string(), text(obj_str(value, "on").or_else(|| value.as_str())));
            out.insert("deleted_by".to_string(), text(obj_str(value, "by")));
        }
        FieldType::Date => {
            let date = obj_str(value, "date").or_else(|| value.as_str());
            out.insert(stem.to_string(), text(date));
            out.insert(format!("{stem}_include_time"), bool_int(obj_bool(value, "include_time")));
        }
        FieldType::DateRange => {
            out.extend(date_range_columns(stem, value));
        }
        FieldType::DueDate => {
            out.extend(date_range_columns(stem, value));
            out.insert(format!("{stem}_is_overdue"), bool_int(obj_bool(value, "is_overdue")));
            out.insert(format!("{stem}_is_completed"), bool_int(obj_bool(value, "is_completed")));
        }
        FieldType::Status => {
            let id = obj_str(value, "id").or_else(|| value.as_str());
            out.insert(stem.to_string(), text(id));
            out.insert(format!("{stem}_updated_on"), text(obj_str(value, "updated_on")));
        }
        FieldType::SingleSelect => {
            out.insert(stem.to_string(), text(value.as_str()));
        }
        FieldType::Address => {
            out.insert(format!("{stem}_text"), text(obj_str(value, "text")));
            out.insert(format!("{stem}_json"), text(Some(&value.to_string())));
        }
        FieldType::FullName => {
            let joined = obj_str(value, "text").or_else(|| value.as_str());
            out.insert(stem.to_string(), text(joined));
            out.insert(format!("{stem}_json"), text(Some(&value.to_string())));
        }
        FieldType::RichDocument => {
            let preview = obj_str(value, "preview").or_else(|| obj_str(value, "html"));
            out.insert(format!("{stem}_preview"), text(preview));
            out.insert(format!("{stem}_json"), text(Some(&value.to_string())));
        }
        FieldType::Checklist => {
            let items = value.get("items").and_then(Value::as_array);
            let total = items.map(|a| a.len() as i64).unwrap_or(0);
            let completed = items
                .map(|a| a.iter().filter(|i| i.get("done").and_then(Value::as_bool).unwrap_or(false)).count() as i64)
                .unwrap_or(0);
            out.insert(format!("{stem}_json"), text(Some(&value.to_string())));
            out.insert(format!("{stem}_total"), ColumnValue::Integer(Some(total)));
            out.insert(format!("{stem}_completed"), ColumnValue::Integer(Some(completed)));
        }
        FieldType::Vote => {
            let count = value.get("count").and_then(Value::as_i64).unwrap_or(0);
            out.insert(format!("{stem}_count"), ColumnValue::Integer(Some(count)));
            out.insert(format!("{stem}_json"), text(Some(&value.to_string())));
        }
        FieldType::TimeTracking => {
            let total = value.get("total").and_then(Value::as_f64).unwrap_or(0.0);
            out.insert(format!("{stem}_json"), text(Some(&value.to_string())));
            out.insert(format!("{stem}_total"), ColumnValue::Real(Some(total)));
        }
        FieldType::Number | FieldType::Currency | FieldType::Percent | FieldType::Duration => {
            out.insert(stem.to_string(), ColumnValue::Real(value.as_f64()));
        }
        FieldType::YesNo => {
            out.insert(stem.to_string(), bool_int(value.as_bool()));
        }
        _ if field_type.is_json_array() => {
            // Empty/absent arrays are stored as the literal "[]", never NULL
            // (spec.md §4.2 — significant for the is_empty operator family).
            let rendered = if value.is_null() {
                "[]".to_string()
            } else {
                value.to_string()
            };
            out.insert(stem.to_string(), ColumnValue::Text(Some(rendered)));
        }
        _ => {
            out.insert(stem.to_string(), text(value.as_str()));
        }
    }
    out
}

/// `field_mapping` stores only `(column_name, column_type)` pairs (spec.md
/// §3), not the label-derived stem those names were built from, so callers
/// that need the stem back (to re-derive the exact column set via
/// `FieldType::columns`) recover it by stripping the fixed suffix each field
/// type's first column carries — the mirror image of `FieldType::columns`.
pub fn recover_stem(field_type: FieldType, cols: &cache_core::table::SlugColumns, fallback_slug: &str) -> String {
    let first = match cols.first() {
        Some((name, _)) => name.as_str(),
        None => return fallback_slug.to_string(),
    };
    let suffix = match field_type {
        FieldType::FirstCreated | FieldType::LastUpdated => "_on",
        FieldType::DeletedDate => return "deleted".to_string(),
        FieldType::DateRange | FieldType::DueDate => "_from",
        FieldType::Address => "_text",
        FieldType::RichDocument | FieldType::Checklist | FieldType::TimeTracking => "_json",
        FieldType::Vote => "_count",
        _ => return first.to_string(),
    };
    first.strip_suffix(suffix).unwrap_or(first).to_string()
}

fn date_range_columns(stem: &str, value: &Value) -> HashMap<String, ColumnValue> {
    let from = value.get("from_date");
    let to = value.get("to_date");
    let mut out = HashMap::new();
    out.insert(
        format!("{stem}_from"),
        text(from.and_then(|d| obj_str(d, "date").or_else(|| d.as_str()))),
    );
    out.insert(
        format!("{stem}_to"),
        text(to.and_then(|d| obj_str(d, "date").or_else(|| d.as_str()))),
    );
    out.insert(
        format!("{stem}_from_include_time"),
        bool_int(from.and_then(|d| obj_bool(d, "include_time"))),
    );
    out.insert(
        format!("{stem}_to_include_time"),
        bool_int(to.and_then(|d| obj_bool(d, "include_time"))),
    );
    out
}

/// Reconstructs the upstream JSON shape from stored columns (spec.md §4.2
/// Reconstruction rules). `columns` holds every column for this field, keyed
/// by its stored name, as produced by `encode_field`.
pub fn decode_field(field_type: FieldType, stem: &str, columns: &HashMap<String, ColumnValue>) -> Value {
    match field_type {
        FieldType::FirstCreated | FieldType::LastUpdated => json!({
            "on": get_text(columns, &format!("{stem}_on")),
            "by": get_text(columns, &format!("{stem}_by")),
        }),
        FieldType::DeletedDate => json!({
            "on": get_text(columns, "deleted_on"),
            "by": get_text(columns, "deleted_by"),
        }),
        FieldType::Date => json!({
            "date": get_text(columns, stem),
            "include_time": get_bool(columns, &format!("{stem}_include_time")),
        }),
        FieldType::DateRange => date_range_value(stem, columns),
        FieldType::DueDate => {
            let mut v = date_range_value(stem, columns);
            if let Value::Object(ref mut map) = v {
                map.insert("is_overdue".to_string(), json!(get_bool(columns, &format!("{stem}_is_overdue"))));
                map.insert(
                    "is_completed".to_string(),
                    json!(get_bool(columns, &format!("{stem}_is_completed"))),
                );
            }
            v
        }
        FieldType::Status => json!({
            "id": get_text(columns, stem),
            "updated_on": get_text(columns, &format!("{stem}_updated_on")),
        }),
        FieldType::SingleSelect => json!(get_text(columns, stem)),
        FieldType::Address => parse_json_column(columns, &format!("{stem}_json")),
        FieldType::FullName => parse_json_column(columns, &format!("{stem}_json")),
        FieldType::RichDocument => parse_json_column(columns, &format!("{stem}_json")),
        FieldType::Checklist => parse_json_column(columns, &format!("{stem}_json")),
        FieldType::Vote => parse_json_column(columns, &format!("{stem}_json")),
        FieldType::TimeTracking => parse_json_column(columns, &format!("{stem}_json")),
        FieldType::Number | FieldType::Currency | FieldType::Percent | FieldType::Duration => {
            json!(get_real(columns, stem))
        }
        FieldType::YesNo => json!(get_bool(columns, stem)),
        _ if field_type.is_json_array() => {
            let raw = get_text(columns, stem).unwrap_or_else(|| "[]".to_string());
            serde_json::from_str(&raw).unwrap_or(Value::Array(Vec::new()))
        }
        _ => json!(get_text(columns, stem)),
    }
}

fn date_range_value(stem: &str, columns: &HashMap<String, ColumnValue>) -> Value {
    json!({
        "from_date": {
            "date": get_text(columns, &format!("{stem}_from")),
            "include_time": get_bool(columns, &format!("{stem}_from_include_time")),
        },
        "to_date": {
            "date": get_text(columns, &format!("{stem}_to")),
            "include_time": get_bool(columns, &format!("{stem}_to_include_time")),
        },
    })
}

fn parse_json_column(columns: &HashMap<String, ColumnValue>, name: &str) -> Value {
    get_text(columns, name)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or(Value::Null)
}

fn get_text(columns: &HashMap<String, ColumnValue>, name: &str) -> Option<String> {
    match columns.get(name) {
        Some(ColumnValue::Text(v)) => v.clone(),
        _ => None,
    }
}

fn get_real(columns: &HashMap<String, ColumnValue>, name: &str) -> Option<f64> {
    match columns.get(name) {
        Some(ColumnValue::Real(v)) => *v,
        Some(ColumnValue::Integer(v)) => v.map(|i| i as f64),
        _ => None,
    }
}

fn get_bool(columns: &HashMap<String, ColumnValue>, name: &str) -> Option<bool> {
    match columns.get(name) {
        Some(ColumnValue::Integer(Some(v))) => Some(*v != 0),
        _ => None,
    }
}

fn text(value: Option<&str>) -> ColumnValue {
    ColumnValue::Text(value.map(str::to_string))
}

fn bool_int(value: Option<bool>) -> ColumnValue {
    ColumnValue::Integer(value.map(|b| if b { 1 } else { 0 }))
}

fn obj_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn obj_bool(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_array_field_stores_literal_empty_array_never_null() {
        let cols = encode_field(FieldType::AssignedTo, "assigned_to", &Value::Null);
        assert_eq!(cols.get("assigned_to"), Some(&ColumnValue::Text(Some("[]".to_string()))));
    }

    #[test]
    fn json_array_round_trips_element_multiset() {
        let value = json!(["u1", "u2", "u1"]);
        let cols = encode_field(FieldType::Tag, "tags", &value);
        let decoded = decode_field(FieldType::Tag, "tags", &cols);
        assert_eq!(decoded, value);
    }

    #[test]
    fn due_date_round_trips_with_flags() {
        let value = json!({
            "from_date": {"date": "2025-03-01", "include_time": false},
            "to_date": {"date": "2025-03-31", "include_time": true},
            "is_overdue": true,
            "is_completed": false,
        });
        let cols = encode_field(FieldType::DueDate, "due", &value);
        assert_eq!(cols.get("due_to"), Some(&ColumnValue::Text(Some("2025-03-31".to_string()))));
        let decoded = decode_field(FieldType::DueDate, "due", &cols);
        assert_eq!(decoded["to_date"]["date"], json!("2025-03-31"));
        assert_eq!(decoded["is_overdue"], json!(true));
        assert_eq!(decoded["is_completed"], json!(false));
    }

    #[test]
    fn number_field_round_trips() {
        let value = json!(42.5);
        let cols = encode_field(FieldType::Currency, "amount", &value);
        let decoded = decode_field(FieldType::Currency, "amount", &cols);
        assert_eq!(decoded, value);
    }
}
