//! The [`Storage`] trait composes the Schema Registry, Record Store,
//! Metadata Caches, Invalidation Coordinator, and Performance Tracker into
//! one interface the orchestration layer depends on, mirroring the way the
//! underlying modules are each implemented as an `impl SqliteStore` block
//! and wired together here rather than duplicated per concern.

use cache_core::resource::MutationLevel;
use cache_core::TableDescriptor;
use serde_json::Value;

use crate::error::Result;
use crate::invalidation::InvalidationEvent;
use crate::metadata::{CachedDeletedRecord, CachedMember, CachedSolution, CachedTableMeta, CachedTeam, CachedView};
use crate::performance::UsageReport;
use crate::records::RawRecord;
use crate::registry::RegistryRow;
use crate::ttl::TtlOverride;
use crate::usage::{ApiCall, ApiStatsSummary};
use crate::SqliteStore;

/// Storage surface the orchestration layer (engine) depends on. `SqliteStore`
/// is the only implementation; the trait exists so the engine can be tested
/// against a boundary rather than a concrete type.
pub trait Storage: Send + Sync {
    // Schema Registry (A)
    fn ensure_table(&self, structure: &TableDescriptor) -> Result<String>;
    fn get_registry(&self, table_id: &str) -> Result<Option<RegistryRow>>;

    // Record Store (C)
    fn replace_all(&self, structure: &TableDescriptor, records: &[RawRecord], ttl_seconds: i64) -> Result<()>;
    fn upsert_one(&self, table_id: &str, record: &RawRecord, ttl_seconds: i64) -> Result<()>;
    fn delete_one(&self, table_id: &str, record_id: &str) -> Result<()>;
    fn table_valid(&self, table_id: &str) -> Result<bool>;
    fn get_one(&self, table_id: &str, record_id: &str) -> Result<Option<RawRecord>>;
    fn query_records(
        &self,
        table_id: &str,
        where_sql: Option<&str>,
        params: &[&dyn rusqlite::types::ToSql],
        order_sql: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawRecord>>;
    fn count_matching(&self, table_id: &str, where_sql: Option<&str>, params: &[&dyn rusqlite::types::ToSql]) -> Result<i64>;
    fn refresh_overdue_flags(&self, table_id: &str) -> Result<usize>;

    // Metadata Caches (E)
    fn put_solutions(&self, rows: &[CachedSolution], ttl_seconds: i64) -> Result<()>;
    fn list_solutions(&self, query: Option<&str>) -> Result<Vec<CachedSolution>>;
    fn solutions_valid(&self) -> Result<bool>;

    fn put_tables(&self, rows: &[CachedTableMeta], ttl_seconds: i64) -> Result<()>;
    fn list_tables(&self, solution_id: Option<&str>) -> Result<Vec<CachedTableMeta>>;
    fn tables_valid(&self, solution_id: Option<&str>) -> Result<bool>;

    fn put_members(&self, rows: &[CachedMember], ttl_seconds: i64) -> Result<()>;
    fn list_members(&self, solution_id: &str, include_deleted: bool) -> Result<Vec<CachedMember>>;
    fn members_valid(&self, solution_id: &str) -> Result<bool>;

    fn put_teams(&self, rows: &[CachedTeam], ttl_seconds: i64) -> Result<()>;
    fn list_teams(&self, solution_id: &str) -> Result<Vec<(CachedTeam, usize)>>;
    fn get_team(&self, id: &str) -> Result<Option<(CachedTeam, Vec<CachedMember>)>>;
    fn teams_valid(&self, solution_id: &str) -> Result<bool>;

    fn put_deleted_records(&self, rows: &[CachedDeletedRecord], ttl_seconds: i64) -> Result<()>;
    fn list_deleted_records(&self, table_id: &str) -> Result<Vec<CachedDeletedRecord>>;
    fn remove_deleted_record(&self, id: &str) -> Result<()>;
    fn deleted_records_valid(&self, table_id: &str) -> Result<bool>;

    fn put_views(&self, rows: &[CachedView], ttl_seconds: i64) -> Result<()>;
    fn list_views(&self, table_id: &str) -> Result<Vec<CachedView>>;
    fn get_view(&self, id: &str) -> Result<Option<CachedView>>;

    // Invalidation Coordinator (F)
    fn apply_invalidation(&self, event: InvalidationEvent) -> Result<()>;

    // Performance Tracker (G) -- read side; writes go through
    // `PerformanceTracker` directly since those are in-memory until flushed.
    fn usage_report(&self) -> Result<UsageReport>;

    // TTL configuration (per-table override on cache_ttl_config)
    fn get_ttl_override(&self, table_id: &str) -> Result<Option<TtlOverride>>;
    fn set_ttl_override(&self, table_id: &str, seconds: i64, mutation_level: MutationLevel, notes: &str) -> Result<()>;
    fn clear_ttl_override(&self, table_id: &str) -> Result<()>;
    fn resolve_ttl_seconds(&self, table_id: &str, default_seconds: i64) -> Result<i64>;

    // API usage accounting (cache_stats, api_call_log, api_stats_summary)
    fn record_stat(&self, category: &str, operation: &str, key: &str, metadata: &Value) -> Result<()>;
    fn count_stats(&self, category: &str, operation: Option<&str>) -> Result<i64>;
    fn log_api_call(&self, call: &ApiCall<'_>) -> Result<()>;
    fn api_stats_for(&self, user_hash: &str) -> Result<Option<ApiStatsSummary>>;
}

impl Storage for SqliteStore {
    fn ensure_table(&self, structure: &TableDescriptor) -> Result<String> {
        SqliteStore::ensure_table(self, structure)
    }

    fn get_registry(&self, table_id: &str) -> Result<Option<RegistryRow>> {
        SqliteStore::get_registry(self, table_id)
    }

    fn replace_all(&self, structure: &TableDescriptor, records: &[RawRecord], ttl_seconds: i64) -> Result<()> {
        SqliteStore::replace_all(self, structure, records, ttl_seconds)
    }

    fn upsert_one(&self, table_id: &str, record: &RawRecord, ttl_seconds: i64) -> Result<()> {
        SqliteStore::upsert_one(self, table_id, record, ttl_seconds)
    }

    fn delete_one(&self, table_id: &str, record_id: &str) -> Result<()> {
        SqliteStore::delete_one(self, table_id, record_id)
    }

    fn table_valid(&self, table_id: &str) -> Result<bool> {
        SqliteStore::table_valid(self, table_id)
    }

    fn get_one(&self, table_id: &str, record_id: &str) -> Result<Option<RawRecord>> {
        SqliteStore::get_one(self, table_id, record_id)
    }

    fn query_records(
        &self,
        table_id: &str,
        where_sql: Option<&str>,
        params: &[&dyn rusqlite::types::ToSql],
        order_sql: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawRecord>> {
        SqliteStore::query_records(self, table_id, where_sql, params, order_sql, limit, offset)
    }

    fn count_matching(&self, table_id: &str, where_sql: Option<&str>, params: &[&dyn rusqlite::types::ToSql]) -> Result<i64> {
        SqliteStore::count_matching(self, table_id, where_sql, params)
    }

    fn refresh_overdue_flags(&self, table_id: &str) -> Result<usize> {
        SqliteStore::refresh_overdue_flags(self, table_id)
    }

    fn put_solutions(&self, rows: &[CachedSolution], ttl_seconds: i64) -> Result<()> {
        SqliteStore::put_solutions(self, rows, ttl_seconds)
    }

    fn list_solutions(&self, query: Option<&str>) -> Result<Vec<CachedSolution>> {
        SqliteStore::list_solutions(self, query)
    }

    fn solutions_valid(&self) -> Result<bool> {
        SqliteStore::solutions_valid(self)
    }

    fn put_tables(&self, rows: &[CachedTableMeta], ttl_seconds: i64) -> Result<()> {
        SqliteStore::put_tables(self, rows, ttl_seconds)
    }

    fn list_tables(&self, solution_id: Option<&str>) -> Result<Vec<CachedTableMeta>> {
        SqliteStore::list_tables(self, solution_id)
    }

    fn tables_valid(&self, solution_id: Option<&str>) -> Result<bool> {
        SqliteStore::tables_valid(self, solution_id)
    }

    fn put_members(&self, rows: &[CachedMember], ttl_seconds: i64) -> Result<()> {
        SqliteStore::put_members(self, rows, ttl_seconds)
    }

    fn list_members(&self, solution_id: &str, include_deleted: bool) -> Result<Vec<CachedMember>> {
        SqliteStore::list_members(self, solution_id, include_deleted)
    }

    fn members_valid(&self, solution_id: &str) -> Result<bool> {
        SqliteStore::members_valid(self, solution_id)
    }

    fn put_teams(&self, rows: &[CachedTeam], ttl_seconds: i64) -> Result<()> {
        SqliteStore::put_teams(self, rows, ttl_seconds)
    }

    fn list_teams(&self, solution_id: &str) -> Result<Vec<(CachedTeam, usize)>> {
        SqliteStore::list_teams(self, solution_id)
    }

    fn get_team(&self, id: &str) -> Result<Option<(CachedTeam, Vec<CachedMember>)>> {
        SqliteStore::get_team(self, id)
    }

    fn teams_valid(&self, solution_id: &str) -> Result<bool> {
        SqliteStore::teams_valid(self, solution_id)
    }

    fn put_deleted_records(&self, rows: &[CachedDeletedRecord], ttl_seconds: i64) -> Result<()> {
        SqliteStore::put_deleted_records(self, rows, ttl_seconds)
    }

    fn list_deleted_records(&self, table_id: &str) -> Result<Vec<CachedDeletedRecord>> {
        SqliteStore::list_deleted_records(self, table_id)
    }

    fn remove_deleted_record(&self, id: &str) -> Result<()> {
        SqliteStore::remove_deleted_record(self, id)
    }

    fn deleted_records_valid(&self, table_id: &str) -> Result<bool> {
        SqliteStore::deleted_records_valid(self, table_id)
    }

    fn put_views(&self, rows: &[CachedView], ttl_seconds: i64) -> Result<()> {
        SqliteStore::put_views(self, rows, ttl_seconds)
    }

    fn list_views(&self, table_id: &str) -> Result<Vec<CachedView>> {
        SqliteStore::list_views(self, table_id)
    }

    fn get_view(&self, id: &str) -> Result<Option<CachedView>> {
        SqliteStore::get_view(self, id)
    }

    fn apply_invalidation(&self, event: InvalidationEvent) -> Result<()> {
        SqliteStore::apply_invalidation(self, event)
    }

    fn usage_report(&self) -> Result<UsageReport> {
        SqliteStore::usage_report(self)
    }

    fn get_ttl_override(&self, table_id: &str) -> Result<Option<TtlOverride>> {
        SqliteStore::get_ttl_override(self, table_id)
    }

    fn set_ttl_override(&self, table_id: &str, seconds: i64, mutation_level: MutationLevel, notes: &str) -> Result<()> {
        SqliteStore::set_ttl_override(self, table_id, seconds, mutation_level, notes)
    }

    fn clear_ttl_override(&self, table_id: &str) -> Result<()> {
        SqliteStore::clear_ttl_override(self, table_id)
    }

    fn resolve_ttl_seconds(&self, table_id: &str, default_seconds: i64) -> Result<i64> {
        SqliteStore::resolve_ttl_seconds(self, table_id, default_seconds)
    }

    fn record_stat(&self, category: &str, operation: &str, key: &str, metadata: &Value) -> Result<()> {
        SqliteStore::record_stat(self, category, operation, key, metadata)
    }

    fn count_stats(&self, category: &str, operation: Option<&str>) -> Result<i64> {
        SqliteStore::count_stats(self, category, operation)
    }

    fn log_api_call(&self, call: &ApiCall<'_>) -> Result<()> {
        SqliteStore::log_api_call(self, call)
    }

    fn api_stats_for(&self, user_hash: &str) -> Result<Option<ApiStatsSummary>> {
        SqliteStore::api_stats_for(self, user_hash)
    }
}
