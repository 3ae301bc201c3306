//! Response Shaper (I, spec.md §4.9): field projection, rich-document HTML
//! extraction, compact vs JSON encoding, and the envelope shapes the engine
//! hands back to its caller.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Desired output encoding for a listing (spec.md §4.9: compact is the
/// list-operation default, JSON on request).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Compact,
    Json,
}

/// A compact tabular encoding: one header row naming the projected fields,
/// one row per record in the same column order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Either encoding a shaped record set can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapedRecords {
    Compact(CompactTable),
    Json(Vec<Map<String, Value>>),
}

/// Envelope every listing operation returns (spec.md §4.9): `total_count`
/// and `count` are always present; `summary` is populated only in
/// summary-only mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEnvelope {
    pub data: ShapedRecords,
    pub total_count: i64,
    pub count: i64,
    pub summary: Option<HashMap<String, HashMap<String, i64>>>,
}

/// Minimal mutation envelope (spec.md §4.9); `full` requests the complete
/// reconstructed record instead.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationEnvelope {
    pub success: bool,
    pub id: String,
    pub title: Option<String>,
    pub operation: String,
    pub timestamp: String,
    pub cached: bool,
    pub full_record: Option<Map<String, Value>>,
}

impl MutationEnvelope {
    pub fn new(success: bool, id: impl Into<String>, title: Option<String>, operation: impl Into<String>, cached: bool) -> Self {
        Self {
            success,
            id: id.into(),
            title,
            operation: operation.into(),
            timestamp: now_rfc3339(),
            cached,
            full_record: None,
        }
    }

    pub fn with_full_record(mut self, record: Map<String, Value>) -> Self {
        self.full_record = Some(record);
        self
    }
}

fn now_rfc3339() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Projects a reconstructed record down to `id`, `title` (if known), and
/// `wanted` fields (spec.md §4.9). `wanted = None` means "all fields".
pub fn project_fields(id: &str, title: Option<&str>, fields: &HashMap<String, Value>, wanted: Option<&[String]>) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("id".to_string(), Value::String(id.to_string()));
    if let Some(title) = title {
        out.insert("title".to_string(), Value::String(title.to_string()));
    }
    match wanted {
        None => {
            for (slug, value) in fields {
                out.insert(slug.clone(), extract_rich_document(value));
            }
        }
        Some(slugs) => {
            for slug in slugs {
                if let Some(value) = fields.get(slug) {
                    out.insert(slug.clone(), extract_rich_document(value));
                }
            }
        }
    }
    out
}

/// If `value` looks like a stored rich-document blob (an object carrying
/// `data`, `html`, and `preview` keys -- the Field Codec's storage shape for
/// `rich-document` fields), emit only the `html` component. Any other shape
/// passes through unchanged.
pub fn extract_rich_document(value: &Value) -> Value {
    match value.as_object() {
        Some(obj) if obj.contains_key("data") && obj.contains_key("html") && obj.contains_key("preview") => {
            obj.get("html").cloned().unwrap_or(Value::Null)
        }
        _ => value.clone(),
    }
}

/// Encodes a set of already-projected records as either a compact table
/// (uniform header derived from the union of keys across `records`, with
/// `id`/`title` pinned first) or a plain JSON array.
pub fn encode(records: Vec<Map<String, Value>>, encoding: Encoding) -> ShapedRecords {
    match encoding {
        Encoding::Json => ShapedRecords::Json(records),
        Encoding::Compact => ShapedRecords::Compact(to_compact(records)),
    }
}

fn to_compact(records: Vec<Map<String, Value>>) -> CompactTable {
    let mut headers: Vec<String> = vec!["id".to_string()];
    if records.iter().any(|r| r.contains_key("title")) {
        headers.push("title".to_string());
    }
    for record in &records {
        for key in record.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .into_iter()
        .map(|mut record| headers.iter().map(|h| record.remove(h).unwrap_or(Value::Null)).collect())
        .collect();

    CompactTable { headers, rows }
}

/// Per-field value-distribution for summary-only listings (spec.md §4.9):
/// for each requested field, a count of how many records hold each distinct
/// stringified value.
pub fn value_distribution(records: &[Map<String, Value>], fields: &[String]) -> HashMap<String, HashMap<String, i64>> {
    let mut out: HashMap<String, HashMap<String, i64>> = HashMap::new();
    for field in fields {
        let counts = out.entry(field.clone()).or_default();
        for record in records {
            let key = match record.get(field) {
                None | Some(Value::Null) => "null".to_string(),
                Some(v) => v.to_string(),
            };
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_fields_always_includes_id_and_title() {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), json!("open"));
        fields.insert("notes".to_string(), json!("hidden"));
        let projected = project_fields("rec_1", Some("Task One"), &fields, Some(&["status".to_string()]));
        assert_eq!(projected.get("id").unwrap(), "rec_1");
        assert_eq!(projected.get("title").unwrap(), "Task One");
        assert_eq!(projected.get("status").unwrap(), "open");
        assert!(!projected.contains_key("notes"));
    }

    #[test]
    fn extract_rich_document_pulls_html_only() {
        let doc = json!({"data": {"blocks": []}, "html": "<p>hi</p>", "preview": "hi"});
        assert_eq!(extract_rich_document(&doc), json!("<p>hi</p>"));
        let plain = json!("just text");
        assert_eq!(extract_rich_document(&plain), plain);
    }

    #[test]
    fn compact_encoding_has_uniform_header_and_rows() {
        let mut a = Map::new();
        a.insert("id".to_string(), json!("1"));
        a.insert("title".to_string(), json!("A"));
        a.insert("status".to_string(), json!("open"));
        let mut b = Map::new();
        b.insert("id".to_string(), json!("2"));
        b.insert("title".to_string(), json!("B"));

        match encode(vec![a, b], Encoding::Compact) {
            ShapedRecords::Compact(table) => {
                assert_eq!(table.headers, vec!["id", "title", "status"]);
                assert_eq!(table.rows.len(), 2);
                assert_eq!(table.rows[1][2], Value::Null);
            }
            _ => panic!("expected compact encoding"),
        }
    }

    #[test]
    fn value_distribution_counts_distinct_values() {
        let mut a = Map::new();
        a.insert("status".to_string(), json!("open"));
        let mut b = Map::new();
        b.insert("status".to_string(), json!("open"));
        let mut c = Map::new();
        c.insert("status".to_string(), json!("done"));

        let dist = value_distribution(&[a, b, c], &["status".to_string()]);
        let status_counts = &dist["status"];
        assert_eq!(status_counts["open"], 2);
        assert_eq!(status_counts["done"], 1);
    }

    #[test]
    fn mutation_envelope_defaults_to_minimal() {
        let envelope = MutationEnvelope::new(true, "rec_1", Some("Task".to_string()), "update_record", true);
        assert!(envelope.full_record.is_none());
        assert_eq!(envelope.operation, "update_record");
    }
}
