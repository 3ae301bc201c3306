//! Minimal upstream JSON DTOs (spec.md §6's external collaborator).
//!
//! These mirror only the shape the cache needs to hydrate its own tables;
//! they are not a full client SDK for the upstream API.

use std::collections::HashMap;

use cache_core::FieldDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionDto {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDto {
    pub id: String,
    pub solution_id: String,
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDto {
    pub id: String,
    pub fields: HashMap<String, Value>,
}

/// One page of a paged record listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<RecordDto>,
    pub next_cursor: Option<String>,
    pub total_count: Option<i64>,
}

/// Paging and hydration options for `list_records` (spec.md §6: "paged,
/// with a hydration flag").
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
    /// When true, the upstream response includes fully-resolved field
    /// values (e.g. linked-record display values) rather than bare ids.
    pub hydrated: bool,
    /// Portable filter-tree, wire-encoded (`FilterNode::to_wire`), forwarded
    /// verbatim to upstream for filtered listing against an uncached table
    /// (spec.md §1: "...or forwards to the upstream API otherwise").
    pub filter: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDto {
    pub id: String,
    pub solution_id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub deleted_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDto {
    pub id: String,
    pub solution_id: String,
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentDto {
    pub id: String,
    pub record_id: String,
    pub body: String,
    pub author_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDto {
    pub id: String,
    pub table_id: String,
    pub name: String,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedRecordDto {
    pub id: String,
    pub table_id: String,
    pub data: Value,
}

/// One bulk mutation item: create, update, or delete by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BulkRecordOp {
    Create { fields: HashMap<String, Value> },
    Update { id: String, fields: HashMap<String, Value> },
    Delete { id: String },
}

/// Per-item outcome of a bulk record operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRecordResult {
    pub succeeded: Vec<RecordDto>,
    pub failed: Vec<BulkRecordFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRecordFailure {
    pub index: usize,
    pub message: String,
}
