//! DDL statements for the fixed part of the schema (spec.md §6).
//!
//! `cache_records_*` tables are created dynamically by the Schema Registry
//! (see `registry.rs`); everything here exists once per store regardless of
//! how many upstream tables get cached.

/// Current schema version. Bumped whenever DDL or migrations change.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Core DDL statements executed during `init_schema`.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // -- Schema registry (A) -------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS cache_table_registry (
        table_id       TEXT PRIMARY KEY,
        sql_table_name TEXT NOT NULL UNIQUE,
        table_name     TEXT NOT NULL,
        structure      TEXT NOT NULL,
        field_mapping  TEXT NOT NULL,
        created_at     TEXT NOT NULL,
        updated_at     TEXT NOT NULL
    )
    "#,
    // -- TTL configuration ----------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS cache_ttl_config (
        table_id       TEXT PRIMARY KEY,
        ttl_seconds    INTEGER NOT NULL,
        mutation_level TEXT NOT NULL,
        notes          TEXT NOT NULL DEFAULT '',
        updated_at     TEXT NOT NULL
    )
    "#,
    // -- Stats / usage accounting (G, §3 supplement) -------------------------
    r#"
    CREATE TABLE IF NOT EXISTS cache_stats (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        category  TEXT NOT NULL,
        operation TEXT NOT NULL,
        key       TEXT NOT NULL DEFAULT '',
        timestamp TEXT NOT NULL,
        metadata  TEXT NOT NULL DEFAULT '{}'
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cache_stats_category ON cache_stats(category, timestamp)",
    r#"
    CREATE TABLE IF NOT EXISTS cache_performance (
        table_id         TEXT PRIMARY KEY,
        hit_count        INTEGER NOT NULL DEFAULT 0,
        miss_count       INTEGER NOT NULL DEFAULT 0,
        last_access_time TEXT,
        record_count     INTEGER NOT NULL DEFAULT 0,
        cache_size_bytes INTEGER NOT NULL DEFAULT 0,
        updated_at       TEXT NOT NULL
    )
    "#,
    // -- API usage accounting (§3) -------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS api_call_log (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        user_hash   TEXT NOT NULL,
        session_id  TEXT NOT NULL,
        method      TEXT NOT NULL,
        endpoint    TEXT NOT NULL,
        solution_id TEXT,
        table_id    TEXT,
        timestamp   TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_api_call_log_user ON api_call_log(user_hash, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_api_call_log_session ON api_call_log(session_id)",
    r#"
    CREATE TABLE IF NOT EXISTS api_stats_summary (
        user_hash   TEXT PRIMARY KEY,
        total_calls INTEGER NOT NULL DEFAULT 0,
        first_call  TEXT NOT NULL,
        last_call   TEXT NOT NULL
    )
    "#,
    // -- Metadata caches (E) --------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS cached_solutions (
        id         TEXT PRIMARY KEY,
        name       TEXT NOT NULL,
        data       TEXT NOT NULL,
        cached_at  TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cached_tables (
        id          TEXT PRIMARY KEY,
        solution_id TEXT NOT NULL,
        name        TEXT NOT NULL,
        data        TEXT NOT NULL,
        cached_at   TEXT NOT NULL,
        expires_at  TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cached_tables_solution ON cached_tables(solution_id)",
    r#"
    CREATE TABLE IF NOT EXISTS cached_members (
        id           TEXT PRIMARY KEY,
        solution_id  TEXT NOT NULL,
        name         TEXT NOT NULL,
        email        TEXT NOT NULL DEFAULT '',
        deleted_date TEXT,
        data         TEXT NOT NULL,
        cached_at    TEXT NOT NULL,
        expires_at   TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cached_members_solution ON cached_members(solution_id)",
    r#"
    CREATE TABLE IF NOT EXISTS cached_teams (
        id          TEXT PRIMARY KEY,
        solution_id TEXT NOT NULL,
        name        TEXT NOT NULL,
        member_ids  TEXT NOT NULL DEFAULT '[]',
        data        TEXT NOT NULL,
        cached_at   TEXT NOT NULL,
        expires_at  TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cached_teams_solution ON cached_teams(solution_id)",
    r#"
    CREATE TABLE IF NOT EXISTS cached_deleted_records (
        id         TEXT PRIMARY KEY,
        table_id   TEXT NOT NULL,
        data       TEXT NOT NULL,
        cached_at  TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cached_deleted_records_table ON cached_deleted_records(table_id)",
    r#"
    CREATE TABLE IF NOT EXISTS cached_views (
        id         TEXT PRIMARY KEY,
        table_id   TEXT NOT NULL,
        name       TEXT NOT NULL,
        data       TEXT NOT NULL,
        cached_at  TEXT NOT NULL,
        expires_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cached_views_table ON cached_views(table_id)",
    // -- Bookkeeping ----------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS config (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metadata (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

/// Schema migrations applied after initial DDL.
///
/// Each migration is a `(name, sql)` pair, tracked in the `metadata` table
/// under the key `migration:<name>` so it runs at most once.
pub const MIGRATIONS: &[(&str, &str)] = &[];
