//! The Orchestration layer (spec.md §2 item 3): for each operation, decides
//! cache-first vs API-first, hydrates the cache from upstream responses,
//! coordinates single-record upsert/delete on mutation, cascades
//! invalidation on structural/membership change, and shapes responses.
//!
//! Binds to `cache_storage::SqliteStore` concretely rather than the
//! `Storage` trait object: `cache_query::Query` is built directly against
//! `SqliteStore` (it needs a connection, not just the trait's read/write
//! surface), so nothing is gained by routing through `dyn Storage` here.
//! The trait still documents the storage boundary for crates that don't
//! need the query builder.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

use cache_core::filter::FilterNode;
use cache_core::{generate_session_id, FieldDescriptor, TableDescriptor, TimezoneConfig};
use cache_query::{Query, SortDirection};
use cache_storage::{InvalidationEvent, RawRecord, SqliteStore};
use cache_upstream::{BulkRecordOp, BulkRecordResult, PageRequest, RecordDto, UpstreamClient};

use crate::error::{EngineError, Result};
use crate::shaper::{self, Encoding, ListEnvelope, MutationEnvelope};

/// Bounded degree for page-parallel upstream fetches (spec.md §5).
const PAGE_FETCH_CONCURRENCY: usize = 4;
/// Page size used when hydrating a table from scratch. Paired with
/// `PageRequest.cursor` being treated as a stringified offset -- an
/// assumption about the upstream API documented in `DESIGN.md` -- so pages
/// beyond the first can be requested without waiting on each other.
const HYDRATION_PAGE_SIZE: i64 = 200;

/// Composes the cache store, the upstream client, the performance tracker,
/// and per-engine identity (session id, hashed account id) into the single
/// entry point a tool-call dispatcher calls into.
pub struct Engine {
    store: Arc<SqliteStore>,
    upstream: Arc<dyn UpstreamClient>,
    performance: cache_storage::PerformanceTracker,
    tz: TimezoneConfig,
    session_id: String,
    user_hash: String,
}

impl Engine {
    pub fn new(store: Arc<SqliteStore>, upstream: Arc<dyn UpstreamClient>, tz: TimezoneConfig, account_id: &str) -> Self {
        let session_id = generate_session_id(chrono::Utc::now(), std::process::id() as u64);
        let user_hash = hash_account_id(account_id);
        Self {
            store,
            upstream,
            performance: cache_storage::PerformanceTracker::new(),
            tz,
            session_id,
            user_hash,
        }
    }

    /// Forces a final performance-tracker flush. Call on shutdown (spec.md §5).
    pub fn close(&self) -> Result<()> {
        self.performance.close(&self.store)?;
        Ok(())
    }

    // -- API usage accounting (spec.md §3/§6, best-effort) -------------------

    fn log_call(&self, method: &str, endpoint: &str, solution_id: Option<&str>, table_id: Option<&str>) {
        let call = cache_storage::ApiCall {
            user_hash: &self.user_hash,
            session_id: &self.session_id,
            method,
            endpoint,
            solution_id,
            table_id,
        };
        if let Err(e) = self.store.log_api_call(&call) {
            warn!(error = %e, "failed to log api call (best-effort)");
        }
    }

    fn record_stat(&self, category: &str, operation: &str, key: &str) {
        if let Err(e) = self.store.record_stat(category, operation, key, &Value::Object(Map::new())) {
            warn!(error = %e, "failed to record stat (best-effort)");
        }
    }

    // -- Cancellation-aware upstream dispatch --------------------------------

    /// Runs `f` on a detached thread and waits up to `timeout`. On timeout
    /// the waiting side gives up and returns [`EngineError::Timeout`]; the
    /// spawned thread is abandoned rather than joined, the closest a
    /// synchronous client gets to "cancel the in-flight request" (spec.md §5).
    fn with_timeout<T, F>(&self, timeout: Duration, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> std::result::Result<T, cache_upstream::UpstreamError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(f());
        });
        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(EngineError::Upstream(e)),
            Err(_) => Err(EngineError::Timeout(timeout)),
        }
    }

    // -- Records --------------------------------------------------------------

    /// Decides cache-first vs API-first, filters/sorts/paginates, and shapes
    /// the result (spec.md §2/§4.4/§4.9).
    #[allow(clippy::too_many_arguments)]
    pub fn list_records(
        &self,
        table_id: &str,
        filter: Option<&FilterNode>,
        sort: Option<(&str, SortDirection)>,
        limit: Option<i64>,
        offset: Option<i64>,
        fields: Option<&[String]>,
        summary_fields: Option<&[String]>,
        encoding: Encoding,
        timeout: Duration,
    ) -> Result<ListEnvelope> {
        let cached = self.store.table_valid(table_id)?;

        // No local rows to translate the filter against: forward it to
        // upstream rather than hydrating the whole table first (spec.md §1,
        // "...or forwards to the upstream API otherwise"). The table is left
        // uncached so a later unfiltered read still triggers a full hydrate.
        if !cached {
            if let Some(node) = filter {
                let envelope =
                    self.list_records_forwarded(table_id, node, sort, limit, offset, fields, summary_fields, encoding, timeout)?;
                self.performance.record_miss(table_id);
                self.performance.maybe_flush(&self.store)?;
                return Ok(envelope);
            }
            self.hydrate_table(table_id, timeout)?;
            self.performance.record_miss(table_id);
        } else {
            self.performance.record_hit(table_id);
        }
        self.performance.maybe_flush(&self.store)?;

        let registry = self
            .store
            .get_registry(table_id)?
            .ok_or_else(|| EngineError::NotFound { entity: "table".to_string(), id: table_id.to_string() })?;
        let primary_slug = registry.structure.fields.iter().find(|f| f.params.primary).map(|f| f.slug.clone());

        let mut query = Query::new(&self.store, table_id, self.tz.clone());
        if let Some(node) = filter {
            query.where_filter_tree(node)?;
        }
        let total_count = query.count()?;
        if let Some((field, dir)) = sort {
            query.order_by(field, dir)?;
        }
        if let Some(n) = limit {
            query.limit(n);
        }
        if let Some(n) = offset {
            query.offset(n);
        }
        let rows = query.execute()?;
        let count = rows.len() as i64;

        let projected: Vec<Map<String, Value>> = rows
            .iter()
            .map(|r| {
                let title = primary_slug.as_deref().and_then(|slug| r.fields.get(slug)).and_then(|v| v.as_str());
                shaper::project_fields(&r.id, title, &r.fields, fields)
            })
            .collect();

        let summary = summary_fields.map(|wanted| shaper::value_distribution(&projected, wanted));
        Ok(ListEnvelope { data: shaper::encode(projected, encoding), total_count, count, summary })
    }

    /// Returns one record, reflecting the stored `is_overdue` flag as-is
    /// (Open Question #1: never recomputed on read).
    pub fn get_record(&self, table_id: &str, record_id: &str, fields: Option<&[String]>, timeout: Duration) -> Result<Option<Map<String, Value>>> {
        if !self.store.table_valid(table_id)? {
            self.hydrate_table(table_id, timeout)?;
            self.performance.record_miss(table_id);
        } else {
            self.performance.record_hit(table_id);
        }

        let registry = self
            .store
            .get_registry(table_id)?
            .ok_or_else(|| EngineError::NotFound { entity: "table".to_string(), id: table_id.to_string() })?;
        let primary_slug = registry.structure.fields.iter().find(|f| f.params.primary).map(|f| f.slug.clone());

        let Some(record) = self.store.get_one(table_id, record_id)? else {
            return Ok(None);
        };
        let title = primary_slug.as_deref().and_then(|slug| record.fields.get(slug)).and_then(|v| v.as_str());
        Ok(Some(shaper::project_fields(&record.id, title, &record.fields, fields)))
    }

    pub fn create_record(&self, table_id: &str, fields: &HashMap<String, Value>, timeout: Duration) -> Result<MutationEnvelope> {
        let created = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            let fields = fields.clone();
            move || upstream.create_record(&table_id, &fields)
        })?;
        self.log_call("POST", "/records", None, Some(table_id));

        let default_ttl = cache_core::resource::ResourceKind::Record.default_ttl_seconds();
        let ttl = self.store.resolve_ttl_seconds(table_id, default_ttl)?;
        self.store.upsert_one(table_id, &record_dto_to_raw(&created), ttl)?;
        self.record_stat("mutation", "create_record", table_id);

        Ok(MutationEnvelope::new(true, created.id, title_of(&created), "create_record", true))
    }

    pub fn update_record(&self, table_id: &str, record_id: &str, fields: &HashMap<String, Value>, timeout: Duration) -> Result<MutationEnvelope> {
        let updated = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            let record_id = record_id.to_string();
            let fields = fields.clone();
            move || upstream.update_record(&table_id, &record_id, &fields)
        })?;
        self.log_call("PATCH", "/records", None, Some(table_id));

        let default_ttl = cache_core::resource::ResourceKind::Record.default_ttl_seconds();
        let ttl = self.store.resolve_ttl_seconds(table_id, default_ttl)?;
        self.store.upsert_one(table_id, &record_dto_to_raw(&updated), ttl)?;
        self.record_stat("mutation", "update_record", table_id);

        Ok(MutationEnvelope::new(true, updated.id, title_of(&updated), "update_record", true))
    }

    pub fn delete_record(&self, table_id: &str, record_id: &str, timeout: Duration) -> Result<MutationEnvelope> {
        self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            let record_id = record_id.to_string();
            move || upstream.delete_record(&table_id, &record_id)
        })?;
        self.log_call("DELETE", "/records", None, Some(table_id));

        self.store.delete_one(table_id, record_id)?;
        self.record_stat("mutation", "delete_record", table_id);

        Ok(MutationEnvelope::new(true, record_id, None, "delete_record", true))
    }

    pub fn bulk_record_op(&self, table_id: &str, ops: &[BulkRecordOp], timeout: Duration) -> Result<BulkRecordResult> {
        let result = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            let ops = ops.to_vec();
            move || upstream.bulk_record_op(&table_id, &ops)
        })?;
        self.log_call("POST", "/records/bulk", None, Some(table_id));

        let default_ttl = cache_core::resource::ResourceKind::Record.default_ttl_seconds();
        let ttl = self.store.resolve_ttl_seconds(table_id, default_ttl)?;
        for dto in &result.succeeded {
            self.store.upsert_one(table_id, &record_dto_to_raw(dto), ttl)?;
        }
        for op in ops {
            if let BulkRecordOp::Delete { id } = op {
                self.store.delete_one(table_id, id)?;
            }
        }
        self.record_stat("mutation", "bulk_record_op", table_id);
        Ok(result)
    }

    // -- Fields (structural change cascades, spec.md §4.6) -------------------

    pub fn add_field(&self, table_id: &str, field: &FieldDescriptor, timeout: Duration) -> Result<FieldDescriptor> {
        let created = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            let field = field.clone();
            move || upstream.add_field(&table_id, &field)
        })?;
        self.log_call("POST", "/fields", None, Some(table_id));
        self.store.apply_invalidation(InvalidationEvent::TableStructureChanged { table_id: table_id.to_string() })?;
        self.record_stat("mutation", "add_field", table_id);
        Ok(created)
    }

    pub fn bulk_add_fields(&self, table_id: &str, fields: &[FieldDescriptor], timeout: Duration) -> Result<Vec<FieldDescriptor>> {
        let created = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            let fields = fields.to_vec();
            move || upstream.bulk_add_fields(&table_id, &fields)
        })?;
        self.log_call("POST", "/fields/bulk", None, Some(table_id));
        self.store.apply_invalidation(InvalidationEvent::TableStructureChanged { table_id: table_id.to_string() })?;
        self.record_stat("mutation", "bulk_add_fields", table_id);
        Ok(created)
    }

    pub fn update_field(&self, table_id: &str, slug: &str, field: &FieldDescriptor, timeout: Duration) -> Result<FieldDescriptor> {
        let updated = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            let slug = slug.to_string();
            let field = field.clone();
            move || upstream.update_field(&table_id, &slug, &field)
        })?;
        self.log_call("PATCH", "/fields", None, Some(table_id));
        self.store.apply_invalidation(InvalidationEvent::TableStructureChanged { table_id: table_id.to_string() })?;
        self.record_stat("mutation", "update_field", table_id);
        Ok(updated)
    }

    pub fn delete_field(&self, table_id: &str, slug: &str, timeout: Duration) -> Result<()> {
        self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            let slug = slug.to_string();
            move || upstream.delete_field(&table_id, &slug)
        })?;
        self.log_call("DELETE", "/fields", None, Some(table_id));
        self.store.apply_invalidation(InvalidationEvent::TableStructureChanged { table_id: table_id.to_string() })?;
        self.record_stat("mutation", "delete_field", table_id);
        Ok(())
    }

    // -- Metadata caches (E) ---------------------------------------------------

    pub fn list_solutions(&self, query: Option<&str>, timeout: Duration) -> Result<ListEnvelope> {
        if !self.store.solutions_valid()? {
            let fetched = self.with_timeout(timeout, {
                let upstream = Arc::clone(&self.upstream);
                move || upstream.list_solutions(None)
            })?;
            self.log_call("GET", "/solutions", None, None);
            let rows: Vec<cache_storage::CachedSolution> = fetched
                .into_iter()
                .map(|s| cache_storage::CachedSolution { id: s.id, name: s.name, data: serde_json::to_value(&s.extra).unwrap_or(Value::Null) })
                .collect();
            self.store.put_solutions(&rows, cache_core::resource::ResourceKind::Solution.default_ttl_seconds())?;
        }
        let rows = self.store.list_solutions(query)?;
        let count = rows.len() as i64;
        let projected: Vec<Map<String, Value>> = rows
            .into_iter()
            .map(|s| {
                let mut m = Map::new();
                m.insert("id".to_string(), Value::String(s.id));
                m.insert("name".to_string(), Value::String(s.name));
                m
            })
            .collect();
        Ok(ListEnvelope { data: shaper::encode(projected, Encoding::Compact), total_count: count, count, summary: None })
    }

    /// Returns a table's descriptor, hydrating the field catalogue from
    /// upstream if the table has never been registered locally.
    pub fn get_table(&self, table_id: &str, timeout: Duration) -> Result<TableDescriptor> {
        if let Some(row) = self.store.get_registry(table_id)? {
            return Ok(row.structure);
        }
        let dto = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            move || upstream.get_table(&table_id)
        })?;
        self.log_call("GET", "/tables", None, Some(table_id));
        let structure = TableDescriptor { table_id: dto.id, name: dto.name, fields: dto.fields };
        self.store.ensure_table(&structure)?;
        Ok(structure)
    }

    pub fn list_members(&self, solution_id: &str, include_deleted: bool, timeout: Duration) -> Result<ListEnvelope> {
        if !self.store.members_valid(solution_id)? {
            let fetched = self.with_timeout(timeout, {
                let upstream = Arc::clone(&self.upstream);
                let solution_id = solution_id.to_string();
                move || upstream.list_members(&solution_id)
            })?;
            self.log_call("GET", "/members", Some(solution_id), None);
            let rows: Vec<cache_storage::CachedMember> = fetched
                .into_iter()
                .map(|m| cache_storage::CachedMember {
                    id: m.id,
                    solution_id: m.solution_id.clone(),
                    name: m.name,
                    email: m.email,
                    deleted_date: m.deleted_date,
                    data: Value::Null,
                })
                .collect();
            self.store.put_members(&rows, cache_core::resource::ResourceKind::Member.default_ttl_seconds())?;
        }

        let rows = self.store.list_members(solution_id, include_deleted)?;
        let count = rows.len() as i64;
        let projected: Vec<Map<String, Value>> = rows
            .into_iter()
            .map(|m| {
                let mut out = Map::new();
                out.insert("id".to_string(), Value::String(m.id));
                out.insert("name".to_string(), Value::String(m.name));
                out.insert("email".to_string(), Value::String(m.email));
                out
            })
            .collect();
        Ok(ListEnvelope { data: shaper::encode(projected, Encoding::Compact), total_count: count, count, summary: None })
    }

    /// Lists teams with member count only (token reduction, spec.md §4.5).
    pub fn list_teams(&self, solution_id: &str, timeout: Duration) -> Result<ListEnvelope> {
        if !self.store.teams_valid(solution_id)? {
            let fetched = self.with_timeout(timeout, {
                let upstream = Arc::clone(&self.upstream);
                let solution_id = solution_id.to_string();
                move || upstream.list_teams(&solution_id)
            })?;
            self.log_call("GET", "/teams", Some(solution_id), None);
            let rows: Vec<cache_storage::CachedTeam> = fetched
                .into_iter()
                .map(|t| cache_storage::CachedTeam { id: t.id, solution_id: t.solution_id.clone(), name: t.name, member_ids: t.member_ids, data: Value::Null })
                .collect();
            self.store.put_teams(&rows, cache_core::resource::ResourceKind::Team.default_ttl_seconds())?;
        }

        let rows = self.store.list_teams(solution_id)?;
        let count = rows.len() as i64;
        let projected: Vec<Map<String, Value>> = rows
            .into_iter()
            .map(|(t, member_count)| {
                let mut out = Map::new();
                out.insert("id".to_string(), Value::String(t.id));
                out.insert("name".to_string(), Value::String(t.name));
                out.insert("member_count".to_string(), Value::Number(member_count.into()));
                out
            })
            .collect();
        Ok(ListEnvelope { data: shaper::encode(projected, Encoding::Compact), total_count: count, count, summary: None })
    }

    pub fn list_comments(&self, record_id: &str, timeout: Duration) -> Result<Vec<cache_upstream::CommentDto>> {
        let comments = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let record_id = record_id.to_string();
            move || upstream.list_comments(&record_id)
        })?;
        self.log_call("GET", "/comments", None, None);
        Ok(comments)
    }

    pub fn add_comment(&self, record_id: &str, body: &str, timeout: Duration) -> Result<cache_upstream::CommentDto> {
        let comment = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let record_id = record_id.to_string();
            let body = body.to_string();
            move || upstream.add_comment(&record_id, &body)
        })?;
        self.log_call("POST", "/comments", None, None);
        self.record_stat("mutation", "add_comment", record_id);
        Ok(comment)
    }

    pub fn list_views(&self, table_id: &str, timeout: Duration) -> Result<Vec<cache_storage::CachedView>> {
        if self.store.list_views(table_id)?.is_empty() {
            let fetched = self.with_timeout(timeout, {
                let upstream = Arc::clone(&self.upstream);
                let table_id = table_id.to_string();
                move || upstream.list_views(&table_id)
            })?;
            self.log_call("GET", "/views", None, Some(table_id));
            let rows: Vec<cache_storage::CachedView> = fetched
                .into_iter()
                .map(|v| cache_storage::CachedView { id: v.id, table_id: v.table_id, name: v.name, data: v.data })
                .collect();
            self.store.put_views(&rows, cache_core::resource::ResourceKind::View.default_ttl_seconds())?;
        }
        Ok(self.store.list_views(table_id)?)
    }

    pub fn get_view(&self, view_id: &str) -> Result<Option<cache_storage::CachedView>> {
        Ok(self.store.get_view(view_id)?)
    }

    pub fn list_deleted_records(&self, table_id: &str, timeout: Duration) -> Result<Vec<cache_storage::CachedDeletedRecord>> {
        if !self.store.deleted_records_valid(table_id)? {
            let fetched = self.with_timeout(timeout, {
                let upstream = Arc::clone(&self.upstream);
                let table_id = table_id.to_string();
                move || upstream.list_deleted_records(&table_id)
            })?;
            self.log_call("GET", "/deleted_records", None, Some(table_id));
            let rows: Vec<cache_storage::CachedDeletedRecord> = fetched
                .into_iter()
                .map(|d| cache_storage::CachedDeletedRecord { id: d.id, table_id: d.table_id, data: d.data })
                .collect();
            self.store.put_deleted_records(&rows, cache_core::resource::ResourceKind::DeletedRecord.default_ttl_seconds())?;
        }
        Ok(self.store.list_deleted_records(table_id)?)
    }

    pub fn restore_deleted_record(&self, table_id: &str, record_id: &str, timeout: Duration) -> Result<MutationEnvelope> {
        let restored = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            let record_id = record_id.to_string();
            move || upstream.restore_deleted_record(&table_id, &record_id)
        })?;
        self.log_call("POST", "/deleted_records/restore", None, Some(table_id));

        let default_ttl = cache_core::resource::ResourceKind::Record.default_ttl_seconds();
        let ttl = self.store.resolve_ttl_seconds(table_id, default_ttl)?;
        self.store.upsert_one(table_id, &record_dto_to_raw(&restored), ttl)?;
        self.store.remove_deleted_record(record_id)?;
        self.record_stat("mutation", "restore_deleted_record", table_id);

        Ok(MutationEnvelope::new(true, restored.id, title_of(&restored), "restore_deleted_record", true))
    }

    pub fn attach_file_by_url(&self, table_id: &str, record_id: &str, field_slug: &str, url: &str, timeout: Duration) -> Result<MutationEnvelope> {
        let updated = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            let record_id = record_id.to_string();
            let field_slug = field_slug.to_string();
            let url = url.to_string();
            move || upstream.attach_file_by_url(&table_id, &record_id, &field_slug, &url)
        })?;
        self.log_call("PATCH", "/records/attach", None, Some(table_id));

        let default_ttl = cache_core::resource::ResourceKind::Record.default_ttl_seconds();
        let ttl = self.store.resolve_ttl_seconds(table_id, default_ttl)?;
        self.store.upsert_one(table_id, &record_dto_to_raw(&updated), ttl)?;
        self.record_stat("mutation", "attach_file_by_url", table_id);

        Ok(MutationEnvelope::new(true, updated.id, title_of(&updated), "attach_file_by_url", true))
    }

    // -- Usage reporting --------------------------------------------------------

    pub fn usage_report(&self) -> Result<cache_storage::UsageReport> {
        self.performance.flush(&self.store)?;
        Ok(self.store.usage_report()?)
    }

    /// Maintenance operation for Open Question #1: forces a recomputation of
    /// `{slug}_is_overdue` against the stored `_to` column for every row.
    /// Never called implicitly by `get_record`/`list_records`.
    pub fn refresh_overdue_flags(&self, table_id: &str) -> Result<usize> {
        Ok(self.store.refresh_overdue_flags(table_id)?)
    }

    // -- Upstream-forwarded filtering (cold table, spec.md §1) -----------------

    /// Answers `list_records` directly from upstream's own filter evaluation
    /// when nothing is cached locally yet, instead of hydrating the whole
    /// table first. Sort/limit/offset are then applied in-memory over the
    /// filtered result, since `PageRequest` has no sort/offset of its own.
    #[allow(clippy::too_many_arguments)]
    fn list_records_forwarded(
        &self,
        table_id: &str,
        filter: &FilterNode,
        sort: Option<(&str, SortDirection)>,
        limit: Option<i64>,
        offset: Option<i64>,
        fields: Option<&[String]>,
        summary_fields: Option<&[String]>,
        encoding: Encoding,
        timeout: Duration,
    ) -> Result<ListEnvelope> {
        let structure = self.get_table(table_id, timeout)?;
        let primary_slug = structure.fields.iter().find(|f| f.params.primary).map(|f| f.slug.clone());

        let mut records = self.fetch_filtered_records(table_id, filter.to_wire(), timeout)?;
        if let Some((field, dir)) = sort {
            records.sort_by(|a, b| compare_field(a, b, field, dir));
        }
        let total_count = records.len() as i64;

        let skip = offset.unwrap_or(0).max(0) as usize;
        let page: Vec<&RecordDto> = match limit {
            Some(n) => records.iter().skip(skip).take(n.max(0) as usize).collect(),
            None => records.iter().skip(skip).collect(),
        };
        let count = page.len() as i64;

        let projected: Vec<Map<String, Value>> = page
            .iter()
            .map(|r| {
                let title = primary_slug.as_deref().and_then(|slug| r.fields.get(slug)).and_then(|v| v.as_str());
                shaper::project_fields(&r.id, title, &r.fields, fields)
            })
            .collect();

        let summary = summary_fields.map(|wanted| shaper::value_distribution(&projected, wanted));
        Ok(ListEnvelope { data: shaper::encode(projected, encoding), total_count, count, summary })
    }

    /// Sequentially chases `next_cursor`, forwarding `filter_wire` on every
    /// page, until upstream reports no further page.
    fn fetch_filtered_records(&self, table_id: &str, filter_wire: Value, timeout: Duration) -> Result<Vec<RecordDto>> {
        let mut records = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.with_timeout(timeout, {
                let upstream = Arc::clone(&self.upstream);
                let table_id = table_id.to_string();
                let filter_wire = filter_wire.clone();
                let cursor = cursor.clone();
                move || {
                    upstream.list_records(
                        &table_id,
                        &PageRequest { cursor, limit: Some(HYDRATION_PAGE_SIZE), hydrated: true, filter: Some(filter_wire) },
                    )
                }
            })?;
            records.extend(page.records);
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        self.log_call("GET", "/records", None, Some(table_id));
        Ok(records)
    }

    // -- Hydration --------------------------------------------------------------

    fn hydrate_table(&self, table_id: &str, timeout: Duration) -> Result<()> {
        let structure = self.get_table(table_id, timeout)?;
        let records = self.fetch_all_records(table_id, timeout)?;
        let raw: Vec<RawRecord> = records.iter().map(record_dto_to_raw).collect();
        let default_ttl = cache_core::resource::ResourceKind::Record.default_ttl_seconds();
        let ttl = self.store.resolve_ttl_seconds(table_id, default_ttl)?;
        self.store.replace_all(&structure, &raw, ttl)?;
        Ok(())
    }

    /// Fetches every record for `table_id`. The first page reveals
    /// `total_count`; remaining pages are then requested concurrently,
    /// bounded to [`PAGE_FETCH_CONCURRENCY`] in flight at once (spec.md §5).
    /// Falls back to sequential cursor-chasing when the upstream response
    /// doesn't report a total count up front.
    fn fetch_all_records(&self, table_id: &str, timeout: Duration) -> Result<Vec<RecordDto>> {
        let first = self.with_timeout(timeout, {
            let upstream = Arc::clone(&self.upstream);
            let table_id = table_id.to_string();
            move || {
                upstream.list_records(&table_id, &PageRequest { cursor: None, limit: Some(HYDRATION_PAGE_SIZE), hydrated: true, filter: None })
            }
        })?;
        self.log_call("GET", "/records", None, Some(table_id));

        let mut records = first.records;
        let Some(total_count) = first.total_count else {
            // Opaque cursor scheme: chase sequentially, can't parallelise.
            let mut cursor = first.next_cursor;
            while let Some(c) = cursor {
                let page = self.with_timeout(timeout, {
                    let upstream = Arc::clone(&self.upstream);
                    let table_id = table_id.to_string();
                    move || upstream.list_records(&table_id, &PageRequest { cursor: Some(c), limit: Some(HYDRATION_PAGE_SIZE), hydrated: true, filter: None })
                })?;
                records.extend(page.records);
                cursor = page.next_cursor;
            }
            return Ok(records);
        };

        let remaining_pages = (total_count - records.len() as i64).max(0) / HYDRATION_PAGE_SIZE.max(1)
            + if (total_count - records.len() as i64).max(0) % HYDRATION_PAGE_SIZE.max(1) > 0 { 1 } else { 0 };
        if remaining_pages == 0 {
            return Ok(records);
        }

        let offsets: Vec<i64> = (1..=remaining_pages).map(|i| i * HYDRATION_PAGE_SIZE).collect();
        let fetched = thread::scope(|scope| -> Result<Vec<Vec<RecordDto>>> {
            let mut handles = Vec::with_capacity(offsets.len());
            for chunk in offsets.chunks(PAGE_FETCH_CONCURRENCY) {
                let mut batch_handles = Vec::with_capacity(chunk.len());
                for &offset in chunk {
                    let upstream = Arc::clone(&self.upstream);
                    let table_id = table_id.to_string();
                    batch_handles.push(scope.spawn(move || {
                        upstream.list_records(
                            &table_id,
                            &PageRequest { cursor: Some(offset.to_string()), limit: Some(HYDRATION_PAGE_SIZE), hydrated: true, filter: None },
                        )
                    }));
                }
                for handle in batch_handles {
                    let page = handle.join().map_err(|_| EngineError::Validation("page-fetch worker panicked".to_string()))??;
                    handles.push(page.records);
                }
            }
            Ok(handles)
        })?;
        for page in fetched {
            records.extend(page);
        }
        Ok(records)
    }
}

fn record_dto_to_raw(dto: &RecordDto) -> RawRecord {
    RawRecord { id: dto.id.clone(), fields: dto.fields.clone() }
}

/// Best-effort ordering over raw JSON field values for the upstream-forwarded
/// listing path, where there is no SQL column to `ORDER BY` against: numbers
/// compare numerically, strings lexically, anything else falls back to its
/// JSON text form. A missing field is treated as SQL `NULL` -- smaller than
/// any present value -- so reversing for `Desc` sorts it last, matching
/// SQLite's own default `NULLS FIRST`-ascending/`NULLS LAST`-descending
/// ordering that `Query::order_by`'s plain `ORDER BY` relies on.
fn compare_field(a: &RecordDto, b: &RecordDto, field: &str, dir: SortDirection) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let ordering = match (a.fields.get(field), b.fields.get(field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    };
    match dir {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn title_of(dto: &RecordDto) -> Option<String> {
    dto.fields.get("title").and_then(|v| v.as_str()).map(str::to_string)
}

/// Stable, non-reversible identifier for API usage accounting (spec.md §3):
/// SHA-256 of the account id, truncated to 16 hex characters, so the
/// persistent store never holds the bare credential.
fn hash_account_id(account_id: &str) -> String {
    let digest = Sha256::digest(account_id.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_account_id_is_stable_and_truncated() {
        let a = hash_account_id("acct_123");
        let b = hash_account_id("acct_123");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, hash_account_id("acct_456"));
    }
}
