//! Performance Tracker (G, spec.md §4.7): in-memory hit/miss counters per
//! table, flushed to the persistent `cache_performance` table on a
//! count-or-time trigger.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::params;

use crate::error::Result;
use crate::sqlite::SqliteStore;

/// Flush triggers: whichever comes first.
const FLUSH_OP_THRESHOLD: u64 = 100;
const FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A fixed estimate of how many upstream-response tokens a single cache hit
/// avoids re-fetching, used only to produce a human-facing usage figure
/// (spec.md §4.7).
pub const TOKENS_SAVED_PER_HIT: u64 = 600;

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    hits: u64,
    misses: u64,
}

/// In-memory accumulator; call [`PerformanceTracker::record_hit`] /
/// [`record_miss`](PerformanceTracker::record_miss) from the orchestration
/// layer and [`PerformanceTracker::maybe_flush`] after each operation.
pub struct PerformanceTracker {
    state: Mutex<TrackerState>,
}

struct TrackerState {
    per_table: HashMap<String, Counters>,
    ops_since_flush: u64,
    last_flush: Instant,
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                per_table: HashMap::new(),
                ops_since_flush: 0,
                last_flush: Instant::now(),
            }),
        }
    }

    pub fn record_hit(&self, table_id: &str) {
        self.bump(table_id, true);
    }

    pub fn record_miss(&self, table_id: &str) {
        self.bump(table_id, false);
    }

    fn bump(&self, table_id: &str, hit: bool) {
        let mut state = self.state.lock().expect("performance tracker mutex poisoned");
        let counters = state.per_table.entry(table_id.to_string()).or_default();
        if hit {
            counters.hits += 1;
        } else {
            counters.misses += 1;
        }
        state.ops_since_flush += 1;
    }

    fn should_flush(&self) -> bool {
        let state = self.state.lock().expect("performance tracker mutex poisoned");
        state.ops_since_flush >= FLUSH_OP_THRESHOLD || state.last_flush.elapsed() >= FLUSH_INTERVAL
    }

    /// Flushes to `store` if the op-count or time trigger has fired.
    pub fn maybe_flush(&self, store: &SqliteStore) -> Result<()> {
        if self.should_flush() {
            self.flush(store)?;
        }
        Ok(())
    }

    /// Merges in-memory counters into `cache_performance`, then resets.
    /// Called unconditionally by `maybe_flush` once triggered, and directly
    /// by [`Self::close`] for a forced final flush.
    pub fn flush(&self, store: &SqliteStore) -> Result<()> {
        let drained = {
            let mut state = self.state.lock().expect("performance tracker mutex poisoned");
            let drained = std::mem::take(&mut state.per_table);
            state.ops_since_flush = 0;
            state.last_flush = Instant::now();
            drained
        };
        if drained.is_empty() {
            return Ok(());
        }

        let conn = store.lock_conn()?;
        let now = Utc::now().to_rfc3339();
        for (table_id, counters) in drained {
            conn.execute(
                "INSERT INTO cache_performance (table_id, hit_count, miss_count, last_access_time, record_count, cache_size_bytes, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, 0, ?4)
                 ON CONFLICT(table_id) DO UPDATE SET
                    hit_count = hit_count + excluded.hit_count,
                    miss_count = miss_count + excluded.miss_count,
                    last_access_time = excluded.last_access_time,
                    updated_at = excluded.updated_at",
                params![table_id, counters.hits, counters.misses, now],
            )?;
        }
        Ok(())
    }

    /// Forces a final flush; called on shutdown (spec.md §5).
    pub fn close(&self, store: &SqliteStore) -> Result<()> {
        self.flush(store)
    }
}

/// One table's hit-rate report row.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePerformance {
    pub table_id: String,
    pub hit_count: u64,
    pub miss_count: u64,
}

impl TablePerformance {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Aggregate usage report across all tables (spec.md §4.7).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsageReport {
    pub tables: Vec<TablePerformance>,
    pub total_hits: u64,
    pub total_misses: u64,
}

impl UsageReport {
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_hits + self.total_misses;
        if total == 0 {
            0.0
        } else {
            self.total_hits as f64 / total as f64
        }
    }

    pub fn estimated_tokens_saved(&self) -> u64 {
        self.total_hits * TOKENS_SAVED_PER_HIT
    }
}

impl SqliteStore {
    /// Reads the persisted `cache_performance` table into a report.
    /// Counters not yet flushed from an in-memory [`PerformanceTracker`] are
    /// not reflected until flushed.
    pub fn usage_report(&self) -> Result<UsageReport> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT table_id, hit_count, miss_count FROM cache_performance")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(TablePerformance {
                    table_id: row.get(0)?,
                    hit_count: row.get::<_, i64>(1)? as u64,
                    miss_count: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total_hits = rows.iter().map(|r| r.hit_count).sum();
        let total_misses = rows.iter().map(|r| r.miss_count).sum();
        Ok(UsageReport { tables: rows, total_hits, total_misses })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_merges_with_existing_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let tracker = PerformanceTracker::new();
        tracker.record_hit("tbl_1");
        tracker.record_hit("tbl_1");
        tracker.record_miss("tbl_1");
        tracker.flush(&store).unwrap();

        tracker.record_hit("tbl_1");
        tracker.flush(&store).unwrap();

        let report = store.usage_report().unwrap();
        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables[0].hit_count, 3);
        assert_eq!(report.tables[0].miss_count, 1);
    }

    #[test]
    fn hit_rate_and_tokens_saved_are_derived() {
        let report = UsageReport {
            tables: vec![],
            total_hits: 3,
            total_misses: 1,
        };
        assert_eq!(report.hit_rate(), 0.75);
        assert_eq!(report.estimated_tokens_saved(), 3 * TOKENS_SAVED_PER_HIT);
    }

    #[test]
    fn close_forces_flush_even_below_threshold() {
        let store = SqliteStore::open_in_memory().unwrap();
        let tracker = PerformanceTracker::new();
        tracker.record_hit("tbl_1");
        assert!(!tracker.should_flush());
        tracker.close(&store).unwrap();
        assert_eq!(store.usage_report().unwrap().total_hits, 1);
    }
}
