//! A thin `ureq`-based [`UpstreamClient`] implementation. Synchronous,
//! matching the teacher's HTTP style -- no async runtime, no retry or TLS
//! tuning beyond `ureq`'s defaults (those stay out of scope, spec.md §1).

use std::collections::HashMap;

use cache_core::FieldDescriptor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use ureq::Agent;

use crate::client::UpstreamClient;
use crate::error::{Result, UpstreamError};
use crate::model::*;

/// Authenticates with a static token header and an account header
/// (spec.md §6), against a single base URL.
pub struct HttpUpstreamClient {
    agent: Agent,
    base_url: String,
    api_key: String,
    account_id: String,
}

impl HttpUpstreamClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            agent: Agent::new_with_defaults(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            account_id: account_id.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request_json<T: DeserializeOwned>(&self, method: &str, path: &str, body: Option<&Value>) -> Result<T> {
        let url = self.url(path);
        tracing::debug!(method, url = %url, "upstream request");
        let request = self
            .agent
            .request(method, &url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("X-Account-Id", &self.account_id);

        let mut response = match body {
            Some(b) => request.send_json(b).map_err(UpstreamError::Transport)?,
            None => request.call().map_err(UpstreamError::Transport)?,
        };
        Ok(response.body_mut().read_json::<T>()?)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request_json("GET", path, None)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.request_json("POST", path, Some(&serde_json::to_value(body)?))
    }

    fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.request_json("PATCH", path, Some(&serde_json::to_value(body)?))
    }

    fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.agent
            .delete(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("X-Account-Id", &self.account_id)
            .call()
            .map_err(UpstreamError::Transport)?;
        Ok(())
    }
}

impl UpstreamClient for HttpUpstreamClient {
    fn list_solutions(&self, query: Option<&str>) -> Result<Vec<SolutionDto>> {
        match query {
            Some(q) => self.get(&format!("/solutions?q={}", urlencode(q))),
            None => self.get("/solutions"),
        }
    }

    fn get_solution(&self, solution_id: &str) -> Result<SolutionDto> {
        self.get(&format!("/solutions/{solution_id}"))
    }

    fn list_tables(&self, solution_id: &str) -> Result<Vec<TableDto>> {
        self.get(&format!("/solutions/{solution_id}/tables"))
    }

    fn get_table(&self, table_id: &str) -> Result<TableDto> {
        self.get(&format!("/tables/{table_id}"))
    }

    fn list_records(&self, table_id: &str, page: &PageRequest) -> Result<RecordPage> {
        let mut path = format!("/tables/{table_id}/records?hydrated={}", page.hydrated);
        if let Some(cursor) = &page.cursor {
            path.push_str(&format!("&cursor={}", urlencode(cursor)));
        }
        if let Some(limit) = page.limit {
            path.push_str(&format!("&limit={limit}"));
        }
        if let Some(filter) = &page.filter {
            path.push_str(&format!("&filter={}", urlencode(&filter.to_string())));
        }
        self.get(&path)
    }

    fn get_record(&self, table_id: &str, record_id: &str) -> Result<RecordDto> {
        self.get(&format!("/tables/{table_id}/records/{record_id}"))
    }

    fn create_record(&self, table_id: &str, fields: &HashMap<String, Value>) -> Result<RecordDto> {
        self.post(&format!("/tables/{table_id}/records"), &json!({ "fields": fields }))
    }

    fn update_record(&self, table_id: &str, record_id: &str, fields: &HashMap<String, Value>) -> Result<RecordDto> {
        self.patch(&format!("/tables/{table_id}/records/{record_id}"), &json!({ "fields": fields }))
    }

    fn delete_record(&self, table_id: &str, record_id: &str) -> Result<()> {
        self.delete(&format!("/tables/{table_id}/records/{record_id}"))
    }

    fn bulk_record_op(&self, table_id: &str, ops: &[BulkRecordOp]) -> Result<BulkRecordResult> {
        self.post(&format!("/tables/{table_id}/records/bulk"), &json!({ "operations": ops }))
    }

    fn add_field(&self, table_id: &str, field: &FieldDescriptor) -> Result<FieldDescriptor> {
        self.post(&format!("/tables/{table_id}/fields"), field)
    }

    fn bulk_add_fields(&self, table_id: &str, fields: &[FieldDescriptor]) -> Result<Vec<FieldDescriptor>> {
        self.post(&format!("/tables/{table_id}/fields/bulk"), &json!({ "fields": fields }))
    }

    fn update_field(&self, table_id: &str, slug: &str, field: &FieldDescriptor) -> Result<FieldDescriptor> {
        self.patch(&format!("/tables/{table_id}/fields/{slug}"), field)
    }

    fn delete_field(&self, table_id: &str, slug: &str) -> Result<()> {
        self.delete(&format!("/tables/{table_id}/fields/{slug}"))
    }

    fn list_members(&self, solution_id: &str) -> Result<Vec<MemberDto>> {
        self.get(&format!("/solutions/{solution_id}/members"))
    }

    fn list_teams(&self, solution_id: &str) -> Result<Vec<TeamDto>> {
        self.get(&format!("/solutions/{solution_id}/teams"))
    }

    fn list_comments(&self, record_id: &str) -> Result<Vec<CommentDto>> {
        self.get(&format!("/records/{record_id}/comments"))
    }

    fn add_comment(&self, record_id: &str, body: &str) -> Result<CommentDto> {
        self.post(&format!("/records/{record_id}/comments"), &json!({ "body": body }))
    }

    fn list_views(&self, table_id: &str) -> Result<Vec<ViewDto>> {
        self.get(&format!("/tables/{table_id}/views"))
    }

    fn get_view(&self, view_id: &str) -> Result<ViewDto> {
        self.get(&format!("/views/{view_id}"))
    }

    fn list_deleted_records(&self, table_id: &str) -> Result<Vec<DeletedRecordDto>> {
        self.get(&format!("/tables/{table_id}/deleted_records"))
    }

    fn restore_deleted_record(&self, table_id: &str, record_id: &str) -> Result<RecordDto> {
        self.post(&format!("/tables/{table_id}/deleted_records/{record_id}/restore"), &json!({}))
    }

    fn attach_file_by_url(&self, table_id: &str, record_id: &str, field_slug: &str, url: &str) -> Result<RecordDto> {
        self.patch(
            &format!("/tables/{table_id}/records/{record_id}/fields/{field_slug}/attach"),
            &json!({ "url": url }),
        )
    }
}

/// Minimal percent-encoding for query-string values; the upstream API is
/// assumed to accept standard URL encoding for the characters query/cursor
/// values actually contain (no binary payloads go through here).
fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("a b&c"), "a%20b%26c");
        assert_eq!(urlencode("abc-123_XYZ.~"), "abc-123_XYZ.~");
    }
}
