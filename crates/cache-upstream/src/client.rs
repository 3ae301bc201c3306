//! The `UpstreamClient` trait: the boundary the engine depends on for the
//! remote no-code workspace API (spec.md §6). The engine treats an
//! implementation as a request→JSON function and does not depend on
//! transport details -- retry policy, TLS tuning, and the pre-signed-URL
//! file-upload helper stay out of scope (spec.md §1).

use cache_core::FieldDescriptor;

use crate::error::Result;
use crate::model::*;

/// Every upstream operation the engine consumes (spec.md §6).
pub trait UpstreamClient: Send + Sync {
    fn list_solutions(&self, query: Option<&str>) -> Result<Vec<SolutionDto>>;
    fn get_solution(&self, solution_id: &str) -> Result<SolutionDto>;

    fn list_tables(&self, solution_id: &str) -> Result<Vec<TableDto>>;
    fn get_table(&self, table_id: &str) -> Result<TableDto>;

    fn list_records(&self, table_id: &str, page: &PageRequest) -> Result<RecordPage>;
    fn get_record(&self, table_id: &str, record_id: &str) -> Result<RecordDto>;
    fn create_record(&self, table_id: &str, fields: &std::collections::HashMap<String, serde_json::Value>) -> Result<RecordDto>;
    fn update_record(
        &self,
        table_id: &str,
        record_id: &str,
        fields: &std::collections::HashMap<String, serde_json::Value>,
    ) -> Result<RecordDto>;
    fn delete_record(&self, table_id: &str, record_id: &str) -> Result<()>;
    fn bulk_record_op(&self, table_id: &str, ops: &[BulkRecordOp]) -> Result<BulkRecordResult>;

    fn add_field(&self, table_id: &str, field: &FieldDescriptor) -> Result<FieldDescriptor>;
    fn bulk_add_fields(&self, table_id: &str, fields: &[FieldDescriptor]) -> Result<Vec<FieldDescriptor>>;
    fn update_field(&self, table_id: &str, slug: &str, field: &FieldDescriptor) -> Result<FieldDescriptor>;
    fn delete_field(&self, table_id: &str, slug: &str) -> Result<()>;

    fn list_members(&self, solution_id: &str) -> Result<Vec<MemberDto>>;
    fn list_teams(&self, solution_id: &str) -> Result<Vec<TeamDto>>;

    fn list_comments(&self, record_id: &str) -> Result<Vec<CommentDto>>;
    fn add_comment(&self, record_id: &str, body: &str) -> Result<CommentDto>;

    fn list_views(&self, table_id: &str) -> Result<Vec<ViewDto>>;
    fn get_view(&self, view_id: &str) -> Result<ViewDto>;

    fn list_deleted_records(&self, table_id: &str) -> Result<Vec<DeletedRecordDto>>;
    fn restore_deleted_record(&self, table_id: &str, record_id: &str) -> Result<RecordDto>;

    /// Attaches a file to a record field by URL. The pre-signed-URL upload
    /// helper itself is out of scope (spec.md §1); this assumes the caller
    /// already has a fetchable URL.
    fn attach_file_by_url(&self, table_id: &str, record_id: &str, field_slug: &str, url: &str) -> Result<RecordDto>;
}
