//! API usage accounting (spec.md §3, §6): a free-form event log
//! (`cache_stats`) plus per-caller call accounting (`api_call_log`,
//! `api_stats_summary`). Distinct from the Performance Tracker (G), which
//! tracks hit/miss counters per cached table rather than upstream calls.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::error::Result;
use crate::sqlite::SqliteStore;

/// One row logged against an upstream API call, for `api_call_log`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall<'a> {
    pub user_hash: &'a str,
    pub session_id: &'a str,
    pub method: &'a str,
    pub endpoint: &'a str,
    pub solution_id: Option<&'a str>,
    pub table_id: Option<&'a str>,
}

/// Per-caller totals read back from `api_stats_summary`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiStatsSummary {
    pub user_hash: String,
    pub total_calls: i64,
    pub first_call: String,
    pub last_call: String,
}

impl SqliteStore {
    /// Appends a free-form event to `cache_stats`. Best-effort: callers wrap
    /// this and swallow the error (spec.md §7's statistic writes policy)
    /// rather than fail the operation that triggered the event.
    pub fn record_stat(&self, category: &str, operation: &str, key: &str, metadata: &Value) -> Result<()> {
        let conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO cache_stats (category, operation, key, timestamp, metadata) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![category, operation, key, now, metadata.to_string()],
        )?;
        Ok(())
    }

    /// Counts `cache_stats` rows for `category`, optionally narrowed to one
    /// `operation`.
    pub fn count_stats(&self, category: &str, operation: Option<&str>) -> Result<i64> {
        let conn = self.lock_conn()?;
        match operation {
            Some(op) => conn.query_row(
                "SELECT COUNT(*) FROM cache_stats WHERE category = ?1 AND operation = ?2",
                params![category, op],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM cache_stats WHERE category = ?1", params![category], |row| {
                row.get(0)
            }),
        }
        .map_err(Into::into)
    }

    /// Logs one upstream API call and rolls it into that caller's running
    /// totals, in one transaction so the two tables never disagree.
    pub fn log_api_call(&self, call: &ApiCall<'_>) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO api_call_log (user_hash, session_id, method, endpoint, solution_id, table_id, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![call.user_hash, call.session_id, call.method, call.endpoint, call.solution_id, call.table_id, now],
        )?;
        tx.execute(
            "INSERT INTO api_stats_summary (user_hash, total_calls, first_call, last_call)
             VALUES (?1, 1, ?2, ?2)
             ON CONFLICT(user_hash) DO UPDATE SET
                total_calls = total_calls + 1,
                last_call = excluded.last_call",
            params![call.user_hash, now],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Reads one caller's running totals, if they've made any logged calls.
    pub fn api_stats_for(&self, user_hash: &str) -> Result<Option<ApiStatsSummary>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT user_hash, total_calls, first_call, last_call FROM api_stats_summary WHERE user_hash = ?1",
            params![user_hash],
            |row| {
                Ok(ApiStatsSummary {
                    user_hash: row.get(0)?,
                    total_calls: row.get(1)?,
                    first_call: row.get(2)?,
                    last_call: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_stat_then_count() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.record_stat("cache", "hit", "tbl_1", &json!({})).unwrap();
        store.record_stat("cache", "hit", "tbl_1", &json!({})).unwrap();
        store.record_stat("cache", "miss", "tbl_1", &json!({})).unwrap();
        assert_eq!(store.count_stats("cache", None).unwrap(), 3);
        assert_eq!(store.count_stats("cache", Some("hit")).unwrap(), 2);
        assert_eq!(store.count_stats("upstream", None).unwrap(), 0);
    }

    #[test]
    fn log_api_call_accumulates_summary() {
        let store = SqliteStore::open_in_memory().unwrap();
        let call = ApiCall {
            user_hash: "u1",
            session_id: "20260726_093000_abc12345",
            method: "GET",
            endpoint: "/records",
            solution_id: Some("sol_1"),
            table_id: Some("tbl_1"),
        };
        store.log_api_call(&call).unwrap();
        store.log_api_call(&call).unwrap();

        let summary = store.api_stats_for("u1").unwrap().unwrap();
        assert_eq!(summary.total_calls, 2);
        assert!(!summary.first_call.is_empty());
        assert!(summary.first_call <= summary.last_call);
    }

    #[test]
    fn api_stats_for_unknown_user_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.api_stats_for("nobody").unwrap(), None);
    }
}
