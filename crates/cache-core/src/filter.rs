//! The portable filter-tree AST the Filter Translator (H) consumes
//! (spec.md §4.8): `{operator: "and"|"or", fields: [...]}` with nested
//! groups and nested date-mode value envelopes.

use serde_json::Value as Json;

use crate::error::{CoreError, Result};
use crate::operator::Operator;

/// `"and"`/`"or"` at a filter-tree group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }

    pub fn sql_joiner(self) -> &'static str {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// One node of the filter tree: either a leaf condition or a nested group.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Condition(FilterCondition),
    Group(FilterGroup),
}

/// A group of nodes joined by a single logical operator.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    pub op: LogicalOp,
    pub nodes: Vec<FilterNode>,
}

/// A single leaf comparison: `field comparison value`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: String,
    pub comparison: Operator,
    pub value: FilterValue,
}

/// The value half of a leaf condition, after unwrapping any nested date-mode
/// envelope (spec.md §4.8: `{date_mode: "exact_date", date_mode_value: "…"}`).
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(Json),
    Null,
}

impl FilterGroup {
    /// Parses the upstream filter-tree JSON shape into a [`FilterNode`].
    pub fn parse(value: &Json) -> Result<FilterNode> {
        parse_node(value)
    }
}

impl FilterNode {
    /// Re-encodes this node back into the portable filter-tree JSON shape,
    /// for forwarding to upstream when no local cache exists to translate
    /// against (spec.md §1/§4.4). `is_empty`/`is_not_empty` values are
    /// normalised to `null` per `Operator::forwards_as_null`, since upstream
    /// rejects `''` for those operators.
    pub fn to_wire(&self) -> Json {
        match self {
            FilterNode::Condition(cond) => {
                let value = if cond.comparison.forwards_as_null() {
                    Json::Null
                } else {
                    match &cond.value {
                        FilterValue::Scalar(v) => v.clone(),
                        FilterValue::Null => Json::Null,
                    }
                };
                serde_json::json!({
                    "field": cond.field,
                    "comparison": cond.comparison.as_str(),
                    "value": value,
                })
            }
            FilterNode::Group(group) => {
                let op = match group.op {
                    LogicalOp::And => "and",
                    LogicalOp::Or => "or",
                };
                let fields: Vec<Json> = group.nodes.iter().map(FilterNode::to_wire).collect();
                serde_json::json!({ "operator": op, "fields": fields })
            }
        }
    }
}

fn parse_node(value: &Json) -> Result<FilterNode> {
    let obj = value
        .as_object()
        .ok_or_else(|| CoreError::InvalidValue {
            slug: String::new(),
            field_type: "filter-node".to_string(),
            message: "expected a JSON object".to_string(),
        })?;

    if let Some(op_raw) = obj.get("operator").and_then(|v| v.as_str()) {
        if let Some(op) = LogicalOp::parse(op_raw) {
            let fields = obj
                .get("fields")
                .and_then(|v| v.as_array())
                .ok_or_else(|| CoreError::InvalidValue {
                    slug: String::new(),
                    field_type: "filter-group".to_string(),
                    message: "group node missing `fields` array".to_string(),
                })?;
            let nodes = fields.iter().map(parse_node).collect::<Result<Vec<_>>>()?;
            return Ok(FilterNode::Group(FilterGroup { op, nodes }));
        }
    }

    // Leaf condition: {field, comparison, value}.
    let field = obj
        .get("field")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CoreError::InvalidValue {
            slug: String::new(),
            field_type: "filter-condition".to_string(),
            message: "leaf node missing `field`".to_string(),
        })?
        .to_string();
    let comparison_raw = obj
        .get("comparison")
        .and_then(|v| v.as_str())
        .ok_or_else(|| CoreError::InvalidValue {
            slug: field.clone(),
            field_type: "filter-condition".to_string(),
            message: "leaf node missing `comparison`".to_string(),
        })?;
    let comparison = Operator::parse(comparison_raw).ok_or_else(|| CoreError::InvalidValue {
        slug: field.clone(),
        field_type: "filter-condition".to_string(),
        message: format!("unknown comparison operator `{comparison_raw}`"),
    })?;

    let raw_value = obj.get("value").cloned().unwrap_or(Json::Null);
    let value = unwrap_date_envelope(raw_value);

    Ok(FilterNode::Condition(FilterCondition {
        field,
        comparison,
        value,
    }))
}

/// Extracts the concrete value from a nested date-mode envelope
/// (`{date_mode: "exact_date", date_mode_value: "2026-06-15"}`), per
/// spec.md §4.8. Non-envelope values pass through unchanged.
fn unwrap_date_envelope(value: Json) -> FilterValue {
    if value.is_null() {
        return FilterValue::Null;
    }
    if let Some(obj) = value.as_object() {
        if obj.contains_key("date_mode") {
            if let Some(inner) = obj.get("date_mode_value") {
                return FilterValue::Scalar(inner.clone());
            }
        }
    }
    FilterValue::Scalar(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_leaf_condition() {
        let tree = json!({"field": "status", "comparison": "eq", "value": "open"});
        let node = FilterGroup::parse(&tree).unwrap();
        match node {
            FilterNode::Condition(cond) => {
                assert_eq!(cond.field, "status");
                assert_eq!(cond.comparison, Operator::Eq);
                assert_eq!(cond.value, FilterValue::Scalar(json!("open")));
            }
            _ => panic!("expected condition"),
        }
    }

    #[test]
    fn parses_nested_group() {
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
        match node {
            FilterNode::Group(group) => {
                assert_eq!(group.op, LogicalOp::And);
                assert_eq!(group.nodes.len(), 2);
            }
            _ => panic!("expected group"),
        }
    }

    #[test]
    fn unwraps_date_mode_envelope() {
        let tree = json!({
            "field": "due",
            "comparison": "is_on_or_after",
            "value": {"date_mode": "exact_date", "date_mode_value": "2026-06-15"}
        });
        let node = FilterGroup::parse(&tree).unwrap();
        match node {
            FilterNode::Condition(cond) => {
                assert_eq!(cond.value, FilterValue::Scalar(json!("2026-06-15")));
            }
            _ => panic!("expected condition"),
        }
    }

    #[test]
    fn null_value_normalises_for_is_empty() {
        let tree = json!({"field": "labels", "comparison": "is_empty", "value": null});
        let node = FilterGroup::parse(&tree).unwrap();
        match node {
            FilterNode::Condition(cond) => assert_eq!(cond.value, FilterValue::Null),
            _ => panic!("expected condition"),
        }
    }

    #[test]
    fn to_wire_round_trips_a_condition() {
        let tree = json!({"field": "status", "comparison": "eq", "value": "open"});
        let node = FilterGroup::parse(&tree).unwrap();
        assert_eq!(node.to_wire(), tree);
    }

    #[test]
    fn to_wire_forces_null_for_is_empty_even_with_a_stray_value() {
        let node = FilterNode::Condition(FilterCondition {
            field: "labels".to_string(),
            comparison: Operator::IsEmpty,
            value: FilterValue::Scalar(json!("")),
        });
        assert_eq!(node.to_wire(), json!({"field": "labels", "comparison": "is_empty", "value": null}));
    }

    #[test]
    fn to_wire_round_trips_a_group() {
        let tree = json!({
            "operator": "and",
            "fields": [
                {"field": "status", "comparison": "eq", "value": "open"},
                {"field": "priority", "comparison": "gt", "value": 2}
            ]
        });
        let node = FilterGroup::parse(&tree).unwrap();
        assert_eq!(node.to_wire(), tree);
    }
}
